//! 按名称组装的步骤流水线。
//!
//! 每个算法组件包装成一个 [`Step`]：统一的 `run` 入口、可按名称读写的参数。
//! 组件本身不知道注册表的存在。

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

use crate::align::{AnchorFinder, AnchorOpt, ExpandOpt, Expander};
use crate::error::ConfigError;
use crate::model::{BlockSet, Ori};
use crate::resolve::{GraphResolveOpt, GraphResolver, JoinOpt, Joiner, OverlapsResolver, Rest};

/// 流水线中的一步
pub trait Step {
    fn name(&self) -> &'static str;

    /// 参数名与当前值
    fn params(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn set_param(&mut self, param: &str, value: &str) -> Result<(), ConfigError> {
        let _ = value;
        Err(ConfigError::UnknownParam { step: self.name().to_string(), param: param.to_string() })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// 返回分块是否改变
    fn run(&self, bs: &mut BlockSet) -> Result<bool>;
}

// ---------------- 参数解析 ----------------

fn parse_usize(param: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::invalid_value(param, value))
}

fn parse_u32(param: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::invalid_value(param, value))
}

fn parse_bool(param: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::invalid_value(param, value)),
    }
}

/// `-1` 或 `none` 表示不限
fn parse_limit(param: &str, value: &str) -> Result<Option<usize>, ConfigError> {
    match value.trim() {
        "-1" | "none" => Ok(None),
        v => parse_usize(param, v).map(Some),
    }
}

/// `1` 正向，`-1` 反向，`0` 两个方向
fn parse_ori(param: &str, value: &str) -> Result<Option<Ori>, ConfigError> {
    match value.trim() {
        "0" | "both" => Ok(None),
        v => v
            .parse::<i32>()
            .ok()
            .and_then(Ori::from_sign)
            .map(Some)
            .ok_or_else(|| ConfigError::invalid_value(param, value)),
    }
}

fn show_limit(v: Option<usize>) -> String {
    v.map_or_else(|| "-1".to_string(), |v| v.to_string())
}

fn show_ori(v: Option<Ori>) -> String {
    v.map_or(0, Ori::sign).to_string()
}

fn unknown(step: &dyn Step, param: &str) -> ConfigError {
    ConfigError::UnknownParam { step: step.name().to_string(), param: param.to_string() }
}

// ---------------- 步骤 ----------------

#[derive(Debug, Clone, Default)]
pub struct FindAnchors {
    pub opt: AnchorOpt,
}

impl Step for FindAnchors {
    fn name(&self) -> &'static str {
        "find-anchors"
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let o = &self.opt;
        vec![
            ("anchor-size", o.anchor_size.to_string()),
            ("no-palindromes", o.no_palindromes.to_string()),
            ("only-ori", show_ori(o.only_ori)),
            ("skip-similar", o.skip_similar.to_string()),
            ("max-anchor-fragments", show_limit(o.max_anchor_fragments)),
            ("workers", o.workers.to_string()),
        ]
    }

    fn set_param(&mut self, param: &str, value: &str) -> Result<(), ConfigError> {
        match param {
            "anchor-size" => self.opt.anchor_size = parse_usize(param, value)?,
            "no-palindromes" => self.opt.no_palindromes = parse_bool(param, value)?,
            "only-ori" => self.opt.only_ori = parse_ori(param, value)?,
            "skip-similar" => self.opt.skip_similar = parse_bool(param, value)?,
            "max-anchor-fragments" => self.opt.max_anchor_fragments = parse_limit(param, value)?,
            "workers" => self.opt.workers = parse_usize(param, value)?,
            _ => return Err(unknown(self, param)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.opt.validate()
    }

    fn run(&self, bs: &mut BlockSet) -> Result<bool> {
        Ok(AnchorFinder::new(self.opt.clone())?.run(bs)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Expand {
    pub opt: ExpandOpt,
}

impl Step for Expand {
    fn name(&self) -> &'static str {
        "expand"
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let o = &self.opt;
        vec![
            ("batch", o.batch.to_string()),
            ("avoid-overlaps", o.avoid_overlaps.to_string()),
            ("workers", o.workers.to_string()),
            ("max-errors", o.aligner.max_errors.to_string()),
            ("gap-range", o.aligner.gap_range.to_string()),
            ("mismatch-penalty", o.aligner.mismatch_penalty.to_string()),
            ("gap-penalty", o.aligner.gap_penalty.to_string()),
            ("no-tail", o.aligner.no_tail.to_string()),
        ]
    }

    fn set_param(&mut self, param: &str, value: &str) -> Result<(), ConfigError> {
        let o = &mut self.opt;
        match param {
            "batch" => o.batch = parse_usize(param, value)?,
            "avoid-overlaps" => o.avoid_overlaps = parse_bool(param, value)?,
            "workers" => o.workers = parse_usize(param, value)?,
            "max-errors" => o.aligner.max_errors = parse_u32(param, value)?,
            "gap-range" => o.aligner.gap_range = parse_usize(param, value)?,
            "mismatch-penalty" => o.aligner.mismatch_penalty = parse_u32(param, value)?,
            "gap-penalty" => o.aligner.gap_penalty = parse_u32(param, value)?,
            "no-tail" => o.aligner.no_tail = parse_bool(param, value)?,
            _ => return Err(unknown(self, param)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.opt.validate()
    }

    fn run(&self, bs: &mut BlockSet) -> Result<bool> {
        Ok(Expander::new(self.opt.clone())?.run(bs)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resolve;

impl Step for Resolve {
    fn name(&self) -> &'static str {
        "resolve"
    }

    fn run(&self, bs: &mut BlockSet) -> Result<bool> {
        Ok(OverlapsResolver::new().run(bs))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveGraph {
    pub opt: GraphResolveOpt,
}

impl Step for ResolveGraph {
    fn name(&self) -> &'static str {
        "resolve-graph"
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![("min-distance", self.opt.min_distance.to_string())]
    }

    fn set_param(&mut self, param: &str, value: &str) -> Result<(), ConfigError> {
        match param {
            "min-distance" => self.opt.min_distance = parse_usize(param, value)?,
            _ => return Err(unknown(self, param)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.opt.validate()
    }

    fn run(&self, bs: &mut BlockSet) -> Result<bool> {
        Ok(GraphResolver::new(self.opt.clone())?.run(bs))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Join {
    pub opt: JoinOpt,
}

impl Step for Join {
    fn name(&self) -> &'static str {
        "join"
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![("join-max-dist", show_limit(self.opt.max_dist))]
    }

    fn set_param(&mut self, param: &str, value: &str) -> Result<(), ConfigError> {
        match param {
            "join-max-dist" => self.opt.max_dist = parse_limit(param, value)?,
            _ => return Err(unknown(self, param)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.opt.validate()
    }

    fn run(&self, bs: &mut BlockSet) -> Result<bool> {
        Ok(Joiner::new(self.opt.clone())?.run(bs))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddRest;

impl Step for AddRest {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn run(&self, bs: &mut BlockSet) -> Result<bool> {
        Ok(Rest::new().run(bs))
    }
}

/// 重建链表，分块本身不变
#[derive(Debug, Clone, Default)]
pub struct Connector;

impl Step for Connector {
    fn name(&self) -> &'static str {
        "connect"
    }

    fn run(&self, bs: &mut BlockSet) -> Result<bool> {
        bs.connect();
        Ok(false)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CheckNoOverlaps;

impl Step for CheckNoOverlaps {
    fn name(&self) -> &'static str {
        "check-no-overlaps"
    }

    fn run(&self, bs: &mut BlockSet) -> Result<bool> {
        bs.connect();
        if let Some((a, b)) = bs.find_overlap() {
            let (fa, fb) = (bs.fragment(a), bs.fragment(b));
            let seq = bs.seq(fa.seq);
            bail!("fragments {} and {} overlap", fa.id(seq), fb.id(seq));
        }
        Ok(false)
    }
}

// ---------------- 注册表 ----------------

pub type StepMaker = fn() -> Box<dyn Step>;

/// 步骤名到构造函数的映射
pub struct StepRegistry {
    makers: BTreeMap<&'static str, StepMaker>,
}

impl Default for StepRegistry {
    fn default() -> Self {
        let mut r = Self { makers: BTreeMap::new() };
        r.register("find-anchors", || Box::<FindAnchors>::default());
        r.register("expand", || Box::<Expand>::default());
        r.register("resolve", || Box::new(Resolve));
        r.register("resolve-graph", || Box::<ResolveGraph>::default());
        r.register("join", || Box::<Join>::default());
        r.register("rest", || Box::new(AddRest));
        r.register("connect", || Box::new(Connector));
        r.register("check-no-overlaps", || Box::new(CheckNoOverlaps));
        r
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, maker: StepMaker) {
        self.makers.insert(name, maker);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.makers.keys().copied()
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Step>, ConfigError> {
        self.makers
            .get(name)
            .map(|make| make())
            .ok_or_else(|| ConfigError::UnknownStep(name.to_string()))
    }
}

// ---------------- 流水线 ----------------

/// 依次执行的步骤序列
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由逗号分隔的步骤名构造，例如 `find-anchors,expand,resolve`
    pub fn parse(registry: &StepRegistry, list: &str) -> Result<Self, ConfigError> {
        let mut p = Self::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            p.push(registry.create(name)?);
        }
        Ok(p)
    }

    pub fn push(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    /// `step.param=value` 只作用于该名称的步骤，`param=value` 作用于所有具有该参数的步骤
    pub fn set(&mut self, assignment: &str) -> Result<(), ConfigError> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| ConfigError::invalid_value(assignment, ""))?;
        let (step, param) = match key.split_once('.') {
            Some((s, p)) => (Some(s.trim()), p.trim()),
            None => (None, key.trim()),
        };
        let mut applied = 0;
        for s in self.steps.iter_mut() {
            match step {
                Some(name) if s.name() == name => {
                    s.set_param(param, value)?;
                    applied += 1;
                }
                None if s.params().iter().any(|(p, _)| *p == param) => {
                    s.set_param(param, value)?;
                    applied += 1;
                }
                _ => {}
            }
        }
        if applied > 0 {
            return Ok(());
        }
        Err(match step {
            Some(name) => ConfigError::UnknownStep(name.to_string()),
            None => ConfigError::UnknownParam { step: "*".to_string(), param: param.to_string() },
        })
    }

    /// 设置所有带 `workers` 参数的步骤的线程数
    pub fn set_workers(&mut self, workers: usize) -> Result<(), ConfigError> {
        let value = workers.to_string();
        for s in self.steps.iter_mut() {
            if s.params().iter().any(|(p, _)| *p == "workers") {
                s.set_param("workers", &value)?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.steps.iter().try_for_each(|s| s.validate())
    }

    /// 先检查全部参数，再依次执行
    pub fn run(&self, bs: &mut BlockSet) -> Result<bool> {
        self.validate()?;
        let mut changed = false;
        for step in &self.steps {
            let c = step.run(bs).with_context(|| format!("step '{}' failed", step.name()))?;
            bs.compact();
            log::info!(
                "{}: {} ({} blocks, {} fragments)",
                step.name(),
                if c { "changed" } else { "unchanged" },
                bs.block_count(),
                bs.fragment_count()
            );
            changed |= c;
        }
        Ok(changed)
    }
}
