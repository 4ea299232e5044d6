//! Compile cache over the dice parser. One cache per engine instance.

use std::collections::HashMap;
use std::sync::Arc;

use super::eval::{evaluate, evaluate_total, Environment, Roll};
use super::parser::{parse, Expr};
use super::DiceError;
use crate::combat::rng::Rng;

/// Entries kept before the cache is flushed.
const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Parsed expression plus the variable names it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledExpression {
    source: String,
    expr: Expr,
    variables: Vec<String>,
}

impl CompiledExpression {
    pub fn compile(source: &str) -> Result<Self, DiceError> {
        let expr = parse(source)?;
        let variables = expr.variables().into_iter().map(str::to_string).collect();
        Ok(Self {
            source: source.to_string(),
            expr,
            variables,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Variable names referenced by this expression, sorted and deduplicated.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// True when the result cannot depend on per-trial variable bindings.
    pub fn is_variable_free(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn roll(&self, env: &Environment, rng: &mut Rng) -> Result<Roll, DiceError> {
        evaluate(&self.expr, env, rng)
    }

    pub fn total(&self, env: &Environment, rng: &mut Rng) -> Result<i64, DiceError> {
        evaluate_total(&self.expr, env, rng)
    }
}

#[derive(Debug)]
pub struct ExpressionCompiler {
    cache: HashMap<String, Arc<CompiledExpression>>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Default for ExpressionCompiler {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl ExpressionCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: HashMap::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Compile `text`, reusing an earlier compilation of the same trimmed text.
    pub fn compile(&mut self, text: &str) -> Result<Arc<CompiledExpression>, DiceError> {
        let key = text.trim();
        if let Some(compiled) = self.cache.get(key) {
            self.hits += 1;
            return Ok(Arc::clone(compiled));
        }
        self.misses += 1;
        let compiled = Arc::new(CompiledExpression::compile(key)?);
        if self.cache.len() >= self.capacity {
            tracing::debug!(entries = self.cache.len(), "expression cache full, flushing");
            self.cache.clear();
        }
        self.cache.insert(key.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// `(hits, misses)` since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
