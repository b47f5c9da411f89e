//! Deterministic scenario script runner.
//!
//! A line-oriented command interface over the engine: generate or load a
//! world, tweak configs, edit tiles, advance the simulator, run the
//! autonomous builder, print hashes and stats, assert conditions. Control
//! flow (`repeat`/`while`/`if`/`break`/`continue`) and `{token}` expansion
//! live here; the engine below only ever sees a sequence of commands.
//!
//! File I/O goes through the [`ScriptIo`] hooks so the runner stays
//! headless; drivers plug in the save format and exporters.

use std::collections::BTreeMap;

use crate::autobuild::{AutoBuildConfig, run_autobuild};
use crate::grid::{Overlay, World};
use crate::hash::hash_world;
use crate::procgen::{ProcGenConfig, generate_world};
use crate::sim::{SimConfig, Simulator};
use crate::stats::Stats;

/// Parse the boolean spellings accepted across the CLI surface.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Pluggable world I/O for `load` / `save` / `export` commands.
pub trait ScriptIo {
    fn load(&mut self, path: &str) -> Result<(World, ProcGenConfig, SimConfig), String> {
        Err(format!("load not supported by this driver: {path}"))
    }

    fn save(
        &mut self,
        path: &str,
        world: &World,
        proc_cfg: &ProcGenConfig,
        sim_cfg: &SimConfig,
    ) -> Result<(), String> {
        let _ = (world, proc_cfg, sim_cfg);
        Err(format!("save not supported by this driver: {path}"))
    }

    fn export(&mut self, kind: &str, path: &str, world: &World) -> Result<(), String> {
        let _ = world;
        Err(format!("export {kind} not supported by this driver: {path}"))
    }
}

/// Default driver: no filesystem access.
#[derive(Debug, Default)]
pub struct NullIo;

impl ScriptIo for NullIo {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScriptOptions {
    pub quiet: bool,
    /// Hard cap on loop iterations so a buggy `while` cannot hang CI.
    pub max_loop_iterations: i64,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            quiet: false,
            max_loop_iterations: 100_000,
        }
    }
}

/// Mutable script state, exposed so callers can seed the runner and adopt
/// the results.
pub struct ScriptState {
    pub w: i32,
    pub h: i32,
    pub seed: u64,
    pub run_index: i32,

    pub proc_cfg: ProcGenConfig,
    pub autobuild_cfg: AutoBuildConfig,
    pub sim: Simulator,

    pub world: Option<World>,
    /// Per-tick snapshots collected by `tick` and `autobuild`.
    pub tick_stats: Vec<Stats>,

    /// User variables; raw templates, expanded on use.
    pub vars: BTreeMap<String, String>,
}

impl Default for ScriptState {
    fn default() -> Self {
        Self {
            w: 96,
            h: 96,
            seed: 1,
            run_index: 0,
            proc_cfg: ProcGenConfig::default(),
            autobuild_cfg: AutoBuildConfig::default(),
            sim: Simulator::new(SimConfig::default()),
            world: None,
            tick_stats: Vec::new(),
            vars: BTreeMap::new(),
        }
    }
}

#[derive(Default)]
pub struct ScriptOutput {
    /// `echo` / `hash` / `stats` output, stdout-shaped.
    pub printed: Vec<String>,
    pub infos: Vec<String>,
    pub errors: Vec<String>,
}

enum Flow {
    Normal,
    Break,
    Continue,
}

pub struct ScriptRunner<I: ScriptIo = NullIo> {
    pub state: ScriptState,
    pub options: ScriptOptions,
    pub output: ScriptOutput,
    io: I,
}

impl Default for ScriptRunner<NullIo> {
    fn default() -> Self {
        Self::new(NullIo)
    }
}

impl<I: ScriptIo> ScriptRunner<I> {
    pub fn new(io: I) -> Self {
        Self {
            state: ScriptState::default(),
            options: ScriptOptions::default(),
            output: ScriptOutput::default(),
            io,
        }
    }

    /// Run a script from an in-memory string. Stops at the first failing
    /// command.
    pub fn run_text(&mut self, text: &str) -> Result<(), ScriptError> {
        let lines: Vec<(usize, String)> = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim().to_string()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
            .collect();

        let mut budget = self.options.max_loop_iterations;
        match self.exec_block(&lines, &mut budget)? {
            Flow::Normal => Ok(()),
            // A stray break/continue at top level is an authoring error.
            _ => Err(ScriptError {
                line: 0,
                message: "break/continue outside of a loop".into(),
            }),
        }
    }

    // --- Block execution -------------------------------------------------

    fn exec_block(
        &mut self,
        lines: &[(usize, String)],
        budget: &mut i64,
    ) -> Result<Flow, ScriptError> {
        let mut i = 0usize;
        while i < lines.len() {
            let (line_no, line) = &lines[i];
            let mut parts = line.splitn(2, char::is_whitespace);
            let head = parts.next().unwrap_or("").to_ascii_lowercase();
            let rest = parts.next().unwrap_or("").trim();

            match head.as_str() {
                "repeat" | "while" | "if" => {
                    let (body_end, else_at) = self.find_block_end(lines, i)?;
                    let flow =
                        self.exec_structured(lines, i, body_end, else_at, &head, rest, budget)?;
                    match flow {
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                    i = body_end + 1;
                    continue;
                }
                "break" => return Ok(Flow::Break),
                "continue" => return Ok(Flow::Continue),
                "else" | "end" => {
                    return Err(ScriptError {
                        line: *line_no,
                        message: format!("unexpected '{head}'"),
                    });
                }
                _ => {
                    self.exec_command(*line_no, &head, rest)?;
                }
            }
            i += 1;
        }
        Ok(Flow::Normal)
    }

    /// Find the matching `end` for the block opener at `start`, plus the
    /// `else` at this nesting depth (if blocks only).
    fn find_block_end(
        &self,
        lines: &[(usize, String)],
        start: usize,
    ) -> Result<(usize, Option<usize>), ScriptError> {
        let mut depth = 0usize;
        let mut else_at = None;
        for (i, (_, line)) in lines.iter().enumerate().skip(start) {
            let head = line
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            match head.as_str() {
                "repeat" | "while" | "if" => depth += 1,
                "else" if depth == 1 => else_at = Some(i),
                "end" => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok((i, else_at));
                    }
                }
                _ => {}
            }
        }
        Err(ScriptError {
            line: lines[start].0,
            message: "unterminated block (missing 'end')".into(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_structured(
        &mut self,
        lines: &[(usize, String)],
        start: usize,
        end: usize,
        else_at: Option<usize>,
        head: &str,
        arg: &str,
        budget: &mut i64,
    ) -> Result<Flow, ScriptError> {
        let line_no = lines[start].0;
        match head {
            "repeat" => {
                let n = self.eval_expr(line_no, arg)?;
                let body = &lines[start + 1..end];
                for _ in 0..n.max(0) {
                    *budget -= 1;
                    if *budget <= 0 {
                        return Err(ScriptError {
                            line: line_no,
                            message: "loop iteration budget exhausted".into(),
                        });
                    }
                    match self.exec_block(body, budget)? {
                        Flow::Break => break,
                        _ => continue,
                    }
                }
                Ok(Flow::Normal)
            }
            "while" => {
                let body = &lines[start + 1..end];
                loop {
                    if self.eval_expr(line_no, arg)? == 0 {
                        break;
                    }
                    *budget -= 1;
                    if *budget <= 0 {
                        return Err(ScriptError {
                            line: line_no,
                            message: "loop iteration budget exhausted".into(),
                        });
                    }
                    match self.exec_block(body, budget)? {
                        Flow::Break => break,
                        _ => continue,
                    }
                }
                Ok(Flow::Normal)
            }
            "if" => {
                let cond = self.eval_expr(line_no, arg)? != 0;
                let (then_range, else_range) = match else_at {
                    Some(e) => ((start + 1, e), Some((e + 1, end))),
                    None => ((start + 1, end), None),
                };
                if cond {
                    self.exec_block(&lines[then_range.0..then_range.1], budget)
                } else if let Some((a, b)) = else_range {
                    self.exec_block(&lines[a..b], budget)
                } else {
                    Ok(Flow::Normal)
                }
            }
            _ => unreachable!("exec_structured only sees block openers"),
        }
    }

    // --- Commands --------------------------------------------------------

    fn exec_command(&mut self, line: usize, head: &str, rest: &str) -> Result<(), ScriptError> {
        let fail = |message: String| ScriptError { line, message };
        let rest_expanded = self.expand(rest);
        let args: Vec<&str> = rest_expanded.split_whitespace().collect();

        match head {
            "echo" => {
                self.output.printed.push(rest_expanded);
                Ok(())
            }
            "vars" => {
                for (k, v) in &self.state.vars {
                    let line = format!("{k}={}", self.expand(v));
                    self.output.printed.push(line);
                }
                Ok(())
            }
            "set" => {
                let (name, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| fail("set expects: set <name> <value>".into()))?;
                let name = valid_var_name(name).ok_or_else(|| fail("invalid variable name".into()))?;
                self.state.vars.insert(name, value.trim().to_string());
                Ok(())
            }
            "add" => {
                let (name, delta) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| fail("add expects: add <name> <delta>".into()))?;
                let name =
                    valid_var_name(name).ok_or_else(|| fail("invalid variable name".into()))?;
                let delta = self.eval_expr(line, delta.trim())?;
                let cur = self
                    .state
                    .vars
                    .get(&name)
                    .map(|v| self.expand(v))
                    .unwrap_or_else(|| "0".into());
                let cur: i64 = cur
                    .trim()
                    .parse()
                    .map_err(|_| fail(format!("variable {name} is not an integer")))?;
                self.state.vars.insert(name, (cur + delta).to_string());
                Ok(())
            }
            "unset" => {
                self.state.vars.remove(&rest.to_ascii_lowercase());
                Ok(())
            }
            "expect" => {
                let v = self.eval_expr(line, &rest_expanded)?;
                if v == 0 {
                    return Err(fail(format!("expectation failed: {rest}")));
                }
                Ok(())
            }
            "size" => {
                if args.len() != 2 {
                    return Err(fail("size expects: size <w> <h>".into()));
                }
                let w: i32 = args[0].parse().map_err(|_| fail("bad width".into()))?;
                let h: i32 = args[1].parse().map_err(|_| fail("bad height".into()))?;
                if w <= 0 || h <= 0 {
                    return Err(fail("world dimensions must be positive".into()));
                }
                self.state.w = w;
                self.state.h = h;
                Ok(())
            }
            "seed" => {
                let v = args
                    .first()
                    .and_then(|s| parse_u64(s))
                    .ok_or_else(|| fail("seed expects a u64 (decimal or 0x...)".into()))?;
                self.state.seed = v;
                Ok(())
            }
            "gen" => {
                let world =
                    generate_world(self.state.w, self.state.h, self.state.seed, &self.state.proc_cfg);
                self.state.world = Some(world);
                self.refresh();
                self.info(format!(
                    "generated {}x{} seed={}",
                    self.state.w, self.state.h, self.state.seed
                ));
                Ok(())
            }
            "tick" => {
                let n = if args.is_empty() {
                    1
                } else {
                    self.eval_expr(line, &rest_expanded)?
                };
                let world = self.state.world.as_mut().ok_or_else(|| fail("no world".into()))?;
                for _ in 0..n.max(0) {
                    self.state.sim.step_once(world);
                    self.state.tick_stats.push(*world.stats());
                }
                Ok(())
            }
            "autobuild" => {
                let n = if args.is_empty() {
                    1
                } else {
                    self.eval_expr(line, &rest_expanded)?
                };
                let world = self.state.world.as_mut().ok_or_else(|| fail("no world".into()))?;
                let mut collected = Vec::new();
                run_autobuild(
                    world,
                    &mut self.state.sim,
                    &self.state.autobuild_cfg,
                    n.max(0) as i32,
                    Some(&mut collected),
                );
                self.state.tick_stats.extend(collected);
                Ok(())
            }
            "road" => {
                if args.len() < 2 {
                    return Err(fail("road expects: road <x> <y> [level]".into()));
                }
                let x: i32 = args[0].parse().map_err(|_| fail("bad x".into()))?;
                let y: i32 = args[1].parse().map_err(|_| fail("bad y".into()))?;
                let level: u8 = match args.get(2) {
                    Some(v) => v.parse().map_err(|_| fail("bad level".into()))?,
                    None => 1,
                };
                let world = self.state.world.as_mut().ok_or_else(|| fail("no world".into()))?;
                if !world.in_bounds(x, y) {
                    return Err(fail(format!("tile {x},{y} out of bounds")));
                }
                world.set_road_level(x, y, level);
                self.refresh();
                Ok(())
            }
            "overlay" | "zone" => {
                if args.len() != 3 {
                    return Err(fail(format!("{head} expects: {head} <kind> <x> <y>")));
                }
                let overlay = Overlay::parse(&args[0].to_ascii_lowercase())
                    .ok_or_else(|| fail(format!("unknown overlay: {}", args[0])))?;
                if head == "zone" && !overlay.is_zone() {
                    return Err(fail(format!("{} is not a zone overlay", args[0])));
                }
                let x: i32 = args[1].parse().map_err(|_| fail("bad x".into()))?;
                let y: i32 = args[2].parse().map_err(|_| fail("bad y".into()))?;
                let world = self.state.world.as_mut().ok_or_else(|| fail("no world".into()))?;
                if !world.in_bounds(x, y) {
                    return Err(fail(format!("tile {x},{y} out of bounds")));
                }
                world.set_overlay(overlay, x, y);
                self.refresh();
                Ok(())
            }
            "hash" => {
                let world = self.state.world.as_ref().ok_or_else(|| fail("no world".into()))?;
                let h = hash_world(world, true);
                self.output.printed.push(format!("{h:016x}"));
                Ok(())
            }
            "stats" => {
                let world = self.state.world.as_ref().ok_or_else(|| fail("no world".into()))?;
                let s = world.stats();
                self.output.printed.push(format!(
                    "day={} pop={} money={} happiness={:.3}",
                    s.day, s.population, s.money, s.happiness
                ));
                Ok(())
            }
            "load" => {
                let path = rest_expanded.trim();
                if path.is_empty() {
                    return Err(fail("load expects a path".into()));
                }
                let (world, proc_cfg, sim_cfg) = self.io.load(path).map_err(|e| fail(e))?;
                self.state.proc_cfg = proc_cfg;
                self.state.sim.cfg = sim_cfg;
                self.state.w = world.width();
                self.state.h = world.height();
                self.state.seed = world.seed();
                self.state.world = Some(world);
                self.refresh();
                Ok(())
            }
            "save" => {
                let path = rest_expanded.trim().to_string();
                if path.is_empty() {
                    return Err(fail("save expects a path".into()));
                }
                let world = self.state.world.as_ref().ok_or_else(|| fail("no world".into()))?;
                let proc_cfg = self.state.proc_cfg;
                let sim_cfg = self.state.sim.cfg.clone();
                self.io
                    .save(&path, world, &proc_cfg, &sim_cfg)
                    .map_err(|e| fail(e))?;
                Ok(())
            }
            "export" => {
                let (kind, path) = rest_expanded
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| fail("export expects: export <kind> <path>".into()))?;
                let world = self.state.world.as_ref().ok_or_else(|| fail("no world".into()))?;
                self.io
                    .export(kind, path.trim(), world)
                    .map_err(|e| fail(e))?;
                Ok(())
            }
            _ => {
                if let Some(key) = head.strip_prefix("gen.") {
                    return apply_gen_key(&mut self.state.proc_cfg, key, &rest_expanded)
                        .map_err(fail);
                }
                if let Some(key) = head.strip_prefix("sim.") {
                    return apply_sim_key(&mut self.state.sim.cfg, key, &rest_expanded).map_err(fail);
                }
                if let Some(key) = head.strip_prefix("autobuild.") {
                    return apply_autobuild_key(&mut self.state.autobuild_cfg, key, &rest_expanded)
                        .map_err(fail);
                }
                Err(fail(format!("unknown command: {head}")))
            }
        }
    }

    fn refresh(&mut self) {
        if let Some(world) = self.state.world.as_mut() {
            let sim = &self.state.sim;
            sim.refresh_derived_stats(world);
        }
    }

    fn info(&mut self, line: String) {
        if !self.options.quiet {
            self.output.infos.push(line);
        }
    }

    /// JSON run summary for drivers (mirrors the `stats` command, plus the
    /// world hash). `None` until a world exists.
    pub fn json_summary(&self) -> Option<String> {
        let world = self.state.world.as_ref()?;
        let s = world.stats();
        let value = serde_json::json!({
            "run": self.state.run_index,
            "width": world.width(),
            "height": world.height(),
            "seed": world.seed(),
            "hash": format!("{:016x}", hash_world(world, true)),
            "stats": {
                "day": s.day,
                "population": s.population,
                "money": s.money,
                "happiness": s.happiness,
            },
        });
        serde_json::to_string_pretty(&value).ok()
    }

    // --- Token expansion -------------------------------------------------

    /// Expand `{seed} {day} {w} {h} {money} {run} {hash}` and user vars.
    pub fn expand(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let Some(close) = rest[open..].find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            let token = &rest[open + 1..open + close];
            out.push_str(&self.token_value(token));
            rest = &rest[open + close + 1..];
        }
        out.push_str(rest);
        out
    }

    fn token_value(&self, token: &str) -> String {
        let lower = token.to_ascii_lowercase();
        let world = self.state.world.as_ref();
        match lower.as_str() {
            "seed" => return self.state.seed.to_string(),
            "w" => return self.state.w.to_string(),
            "h" => return self.state.h.to_string(),
            "run" => return self.state.run_index.to_string(),
            "day" => return world.map_or(0, |w| w.stats().day).to_string(),
            "money" => return world.map_or(0, |w| w.stats().money).to_string(),
            "hash" => {
                return world
                    .map(|w| format!("{:016x}", hash_world(w, true)))
                    .unwrap_or_else(|| "0".into());
            }
            _ => {}
        }
        if let Some(v) = self.state.vars.get(&lower) {
            return self.expand(v);
        }
        // Unknown tokens pass through unchanged for path templates.
        format!("{{{token}}}")
    }

    // --- Expressions -----------------------------------------------------

    fn eval_expr(&self, line: usize, src: &str) -> Result<i64, ScriptError> {
        let expanded = self.expand(src);
        eval_int_expr(&expanded).map_err(|message| ScriptError { line, message })
    }
}

fn valid_var_name(name: &str) -> Option<String> {
    let lower = name.to_ascii_lowercase();
    let mut chars = lower.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    // Reserved template tokens cannot be shadowed.
    if matches!(
        lower.as_str(),
        "seed" | "w" | "h" | "day" | "money" | "run" | "hash"
    ) {
        return None;
    }
    Some(lower)
}

fn parse_u64(s: &str) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

// --- C-like integer expression evaluator ---------------------------------

struct ExprParser<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

/// Evaluate an integer expression with C-like operators:
/// `+ - * / %  == != < <= > >=  && || !` and parentheses.
pub fn eval_int_expr(src: &str) -> Result<i64, String> {
    let tokens = tokenize(src)?;
    let mut p = ExprParser { tokens, pos: 0 };
    let v = p.parse_or()?;
    if p.pos != p.tokens.len() {
        return Err(format!("unexpected token: {}", p.tokens[p.pos]));
    }
    Ok(v)
}

fn tokenize(src: &str) -> Result<Vec<&str>, String> {
    let mut out = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                i += 1;
            }
            out.push(&src[start..i]);
            continue;
        }
        let two = if i + 1 < bytes.len() { &src[i..i + 2] } else { "" };
        if matches!(two, "==" | "!=" | "<=" | ">=" | "&&" | "||") {
            out.push(two);
            i += 2;
            continue;
        }
        if matches!(c, '+' | '-' | '*' | '/' | '%' | '<' | '>' | '!' | '(' | ')') {
            out.push(&src[i..i + 1]);
            i += 1;
            continue;
        }
        return Err(format!("unexpected character '{c}' in expression"));
    }
    Ok(out)
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn eat(&mut self, tok: &str) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<i64, String> {
        let mut v = self.parse_and()?;
        while self.eat("||") {
            let r = self.parse_and()?;
            v = i64::from(v != 0 || r != 0);
        }
        Ok(v)
    }

    fn parse_and(&mut self) -> Result<i64, String> {
        let mut v = self.parse_cmp()?;
        while self.eat("&&") {
            let r = self.parse_cmp()?;
            v = i64::from(v != 0 && r != 0);
        }
        Ok(v)
    }

    fn parse_cmp(&mut self) -> Result<i64, String> {
        let mut v = self.parse_add()?;
        loop {
            let op = match self.peek() {
                Some(op @ ("==" | "!=" | "<" | "<=" | ">" | ">=")) => op.to_string(),
                _ => break,
            };
            self.pos += 1;
            let r = self.parse_add()?;
            v = i64::from(match op.as_str() {
                "==" => v == r,
                "!=" => v != r,
                "<" => v < r,
                "<=" => v <= r,
                ">" => v > r,
                _ => v >= r,
            });
        }
        Ok(v)
    }

    fn parse_add(&mut self) -> Result<i64, String> {
        let mut v = self.parse_mul()?;
        loop {
            if self.eat("+") {
                v = v.wrapping_add(self.parse_mul()?);
            } else if self.eat("-") {
                v = v.wrapping_sub(self.parse_mul()?);
            } else {
                break;
            }
        }
        Ok(v)
    }

    fn parse_mul(&mut self) -> Result<i64, String> {
        let mut v = self.parse_unary()?;
        loop {
            if self.eat("*") {
                v = v.wrapping_mul(self.parse_unary()?);
            } else if self.eat("/") {
                let r = self.parse_unary()?;
                if r == 0 {
                    return Err("division by zero".into());
                }
                v = v.wrapping_div(r);
            } else if self.eat("%") {
                let r = self.parse_unary()?;
                if r == 0 {
                    return Err("modulo by zero".into());
                }
                v = v.wrapping_rem(r);
            } else {
                break;
            }
        }
        Ok(v)
    }

    fn parse_unary(&mut self) -> Result<i64, String> {
        if self.eat("!") {
            return Ok(i64::from(self.parse_unary()? == 0));
        }
        if self.eat("-") {
            return Ok(self.parse_unary()?.wrapping_neg());
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<i64, String> {
        if self.eat("(") {
            let v = self.parse_or()?;
            if !self.eat(")") {
                return Err("missing ')'".into());
            }
            return Ok(v);
        }
        match self.peek() {
            Some(tok) if tok.chars().all(|c| c.is_ascii_digit()) => {
                self.pos += 1;
                tok.parse().map_err(|_| format!("bad number: {tok}"))
            }
            Some(tok) => Err(format!("expected a number, found '{tok}'")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

// --- Config key assignment -----------------------------------------------

fn norm_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn parse_f32(v: &str) -> Result<f32, String> {
    let f: f32 = v.trim().parse().map_err(|_| format!("bad float: {v}"))?;
    if !f.is_finite() {
        return Err(format!("non-finite float: {v}"));
    }
    Ok(f)
}

fn parse_i32_value(v: &str) -> Result<i32, String> {
    v.trim().parse().map_err(|_| format!("bad integer: {v}"))
}

fn parse_bool_value(v: &str) -> Result<bool, String> {
    parse_bool(v.trim()).ok_or_else(|| format!("bad boolean: {v}"))
}

fn apply_gen_key(cfg: &mut ProcGenConfig, key: &str, value: &str) -> Result<(), String> {
    match norm_key(key).as_str() {
        "terrainscale" => cfg.terrain_scale = parse_f32(value)?,
        "waterlevel" => cfg.water_level = parse_f32(value)?,
        "sandlevel" => cfg.sand_level = parse_f32(value)?,
        "hubs" => cfg.hubs = parse_i32_value(value)?,
        "extraconnections" => cfg.extra_connections = parse_i32_value(value)?,
        "zonechance" => cfg.zone_chance = parse_f32(value)?,
        "parkchance" => cfg.park_chance = parse_f32(value)?,
        other => return Err(format!("unknown gen key: {other}")),
    }
    Ok(())
}

fn apply_sim_key(cfg: &mut SimConfig, key: &str, value: &str) -> Result<(), String> {
    match norm_key(key).as_str() {
        "tickseconds" => cfg.tick_seconds = parse_f32(value)?,
        "requireoutsideconnection" => cfg.require_outside_connection = parse_bool_value(value)?,
        "landvaluerecalcdays" => cfg.land_value_recalc_days = parse_i32_value(value)?,
        "taxresidential" => cfg.budget.tax_residential = parse_i32_value(value)?,
        "taxcommercial" => cfg.budget.tax_commercial = parse_i32_value(value)?,
        "taxindustrial" => cfg.budget.tax_industrial = parse_i32_value(value)?,
        "maintenanceroad" => cfg.budget.maintenance_road = parse_i32_value(value)?,
        "maintenancepark" => cfg.budget.maintenance_park = parse_i32_value(value)?,
        "districtpoliciesenabled" => {
            cfg.budget.district_policies_enabled = parse_bool_value(value)?;
        }
        "growthrate" => cfg.growth.growth_rate = parse_f32(value)?,
        other => return Err(format!("unknown sim key: {other}")),
    }
    Ok(())
}

fn apply_autobuild_key(cfg: &mut AutoBuildConfig, key: &str, value: &str) -> Result<(), String> {
    match norm_key(key).as_str() {
        "zonesperday" => cfg.zones_per_day = parse_i32_value(value)?,
        "zoneclustermaxtiles" => cfg.zone_cluster_max_tiles = parse_i32_value(value)?,
        "roadsperday" => cfg.roads_per_day = parse_i32_value(value)?,
        "roadlevel" => cfg.road_level = parse_i32_value(value)?.clamp(1, 3) as u8,
        "useroadplanner" => cfg.use_road_planner = parse_bool_value(value)?,
        "allowbridges" => cfg.allow_bridges = parse_bool_value(value)?,
        "maxroadspurlength" => cfg.max_road_spur_length = parse_i32_value(value)?,
        "parksperday" => cfg.parks_per_day = parse_i32_value(value)?,
        "parkperzonetiles" => cfg.park_per_zone_tiles = parse_i32_value(value)?,
        "useparkoptimizer" => cfg.use_park_optimizer = parse_bool_value(value)?,
        "autoupgraderoads" => cfg.auto_upgrade_roads = parse_bool_value(value)?,
        "congestionupgradethreshold" => {
            cfg.congestion_upgrade_threshold = parse_f32(value)?;
        }
        "roadupgradesperday" => cfg.road_upgrades_per_day = parse_i32_value(value)?,
        "autobuildresiliencebypasses" => {
            cfg.auto_build_resilience_bypasses = parse_bool_value(value)?;
        }
        "resiliencebypassesperday" => {
            cfg.resilience_bypasses_per_day = parse_i32_value(value)?;
        }
        "minmoneyreserve" => cfg.min_money_reserve = i64::from(parse_i32_value(value)?),
        "ensureoutsideconnection" => cfg.ensure_outside_connection = parse_bool_value(value)?,
        other => return Err(format!("unknown autobuild key: {other}")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &str) -> ScriptRunner<NullIo> {
        let mut runner = ScriptRunner::default();
        runner.run_text(script).expect("script should succeed");
        runner
    }

    #[test]
    fn test_bool_parsing_spellings() {
        for s in ["1", "true", "YES", "On"] {
            assert_eq!(parse_bool(s), Some(true));
        }
        for s in ["0", "False", "no", "OFF"] {
            assert_eq!(parse_bool(s), Some(false));
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_expression_evaluator() {
        assert_eq!(eval_int_expr("1 + 2 * 3").unwrap(), 7);
        assert_eq!(eval_int_expr("(1 + 2) * 3").unwrap(), 9);
        assert_eq!(eval_int_expr("10 % 4").unwrap(), 2);
        assert_eq!(eval_int_expr("3 < 4 && 4 <= 4").unwrap(), 1);
        assert_eq!(eval_int_expr("1 == 2 || 5 > 4").unwrap(), 1);
        assert_eq!(eval_int_expr("!0").unwrap(), 1);
        assert_eq!(eval_int_expr("-3 + 5").unwrap(), 2);
        assert!(eval_int_expr("1 / 0").is_err());
        assert!(eval_int_expr("1 +").is_err());
    }

    #[test]
    fn test_gen_and_hash() {
        let runner = run("size 16 16\nseed 1\ngen\nhash");
        assert_eq!(runner.output.printed.len(), 1);
        assert_eq!(runner.output.printed[0].len(), 16);
    }

    #[test]
    fn test_determinism_across_runs() {
        let a = run("size 24 20\nseed 9\ngen\ntick 5\nhash");
        let b = run("size 24 20\nseed 9\ngen\ntick 5\nhash");
        assert_eq!(a.output.printed, b.output.printed);
    }

    #[test]
    fn test_vars_and_expansion() {
        let runner = run("set name riverton\necho hello {name} seed={seed}");
        assert_eq!(runner.output.printed[0], "hello riverton seed=1");
    }

    #[test]
    fn test_add_and_loops() {
        let runner = run("set n 0\nrepeat 5\nadd n 2\nend\necho {n}");
        assert_eq!(runner.output.printed[0], "10");
    }

    #[test]
    fn test_while_with_break() {
        let runner = run(
            "set i 0\nwhile 1\nadd i 1\nif {i} >= 3\nbreak\nend\nend\necho {i}",
        );
        assert_eq!(runner.output.printed[0], "3");
    }

    #[test]
    fn test_if_else() {
        let runner = run("if 0\necho then\nelse\necho otherwise\nend");
        assert_eq!(runner.output.printed, vec!["otherwise"]);
    }

    #[test]
    fn test_expect_failure_stops_script() {
        let mut runner = ScriptRunner::default();
        let err = runner
            .run_text("size 8 8\ngen\nexpect 1 == 2\necho unreachable")
            .unwrap_err();
        assert!(err.message.contains("expectation failed"));
        assert!(runner.output.printed.is_empty());
    }

    #[test]
    fn test_tick_advances_days() {
        let runner = run("size 16 16\ngen\ntick 3\nexpect {day} == 3");
        assert_eq!(runner.state.tick_stats.len(), 3);
    }

    #[test]
    fn test_config_assignment() {
        let runner = run(
            "gen.hubs 6\nsim.require_outside_connection off\nautobuild.zones_per_day 7",
        );
        assert_eq!(runner.state.proc_cfg.hubs, 6);
        assert!(!runner.state.sim.cfg.require_outside_connection);
        assert_eq!(runner.state.autobuild_cfg.zones_per_day, 7);
    }

    #[test]
    fn test_unknown_command_reports_line() {
        let mut runner = ScriptRunner::default();
        let err = runner.run_text("echo ok\nfrobnicate now").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("frobnicate"));
    }

    #[test]
    fn test_edits_mark_world() {
        let runner = run("size 12 12\ngen\nroad 2 2 1\noverlay park 3 2\nexpect {day} == 0");
        let world = runner.state.world.as_ref().unwrap();
        assert_eq!(world.at(2, 2).overlay, Overlay::Road);
        assert_eq!(world.at(3, 2).overlay, Overlay::Park);
    }

    #[test]
    fn test_reserved_tokens_cannot_be_set() {
        let mut runner = ScriptRunner::default();
        assert!(runner.run_text("set seed 5").is_err());
    }

    #[test]
    fn test_autobuild_command_runs() {
        let runner = run("size 24 24\nseed 3\ngen\nautobuild 3\nexpect {day} == 3");
        assert_eq!(runner.state.tick_stats.len(), 3);
    }

    #[test]
    fn test_null_io_rejects_load() {
        let mut runner = ScriptRunner::default();
        assert!(runner.run_text("load city.sav").is_err());
    }

    #[test]
    fn test_json_summary_shape() {
        let runner = run("size 12 12\nseed 4\ngen\ntick 2");
        let json = runner.json_summary().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["seed"], 4);
        assert_eq!(value["stats"]["day"], 2);
        assert_eq!(value["hash"].as_str().unwrap().len(), 16);

        let empty = ScriptRunner::default();
        assert!(empty.json_summary().is_none());
    }
}
