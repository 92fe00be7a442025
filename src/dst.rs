//! Deterministic simulation testing for the sorted set.
//!
//! Seed-driven random operation sequences with the full invariant set
//! checked after every step:
//! - index coupling (hash and skip list hold the same entries)
//! - composite-key ordering on level 0
//! - span bookkeeping against level-0 distances
//! - rank round-trips for sampled members
//!
//! ## Usage
//!
//! ```rust,ignore
//! for seed in 0..100 {
//!     let mut harness = ZSetDSTHarness::with_seed(seed);
//!     harness.run(500);
//!     assert!(harness.result().is_success(), "Seed {} failed", seed);
//! }
//! ```

use crate::range::ScoreRange;
use crate::zset::ZSet;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Configuration for sorted set DST
#[derive(Debug, Clone)]
pub struct ZSetDSTConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of unique keys to use (creates a bounded key space)
    pub num_keys: usize,
    /// Probability of remove operation
    pub remove_prob: f64,
    /// Probability of increment operation
    pub incr_prob: f64,
    /// Probability of a range delete (by score or by rank)
    pub range_delete_prob: f64,
    /// Probability of a trim (limit / rev_limit)
    pub trim_prob: f64,
    /// Scores are drawn from [-max_score, max_score]
    pub max_score: i64,
}

impl Default for ZSetDSTConfig {
    fn default() -> Self {
        ZSetDSTConfig {
            seed: 0,
            num_keys: 100,
            remove_prob: 0.15,
            incr_prob: 0.15,
            range_delete_prob: 0.05,
            trim_prob: 0.02,
            max_score: 1000,
        }
    }
}

impl ZSetDSTConfig {
    /// Standard configuration with given seed
    pub fn new(seed: u64) -> Self {
        ZSetDSTConfig {
            seed,
            ..Default::default()
        }
    }

    /// Small key space: more updates, repositions and collisions
    pub fn small_keyspace(seed: u64) -> Self {
        ZSetDSTConfig {
            seed,
            num_keys: 10,
            remove_prob: 0.25,
            incr_prob: 0.2,
            range_delete_prob: 0.05,
            trim_prob: 0.02,
            max_score: 50,
        }
    }

    /// Large key space: mostly fresh inserts
    pub fn large_keyspace(seed: u64) -> Self {
        ZSetDSTConfig {
            seed,
            num_keys: 1000,
            remove_prob: 0.05,
            incr_prob: 0.05,
            range_delete_prob: 0.02,
            trim_prob: 0.01,
            max_score: 10_000,
        }
    }
}

/// Operation type for logging
#[derive(Debug, Clone)]
pub enum ZSetOp {
    Add { member: String, score: i64 },
    IncrBy { member: String, delta: i64 },
    Remove { member: String },
    RemoveRangeByScore { start: i64, end: i64 },
    RemoveRangeByRank { start: isize, end: isize },
    Limit { n: usize, rev: bool },
}

/// Result of a sorted set DST run
#[derive(Debug, Clone)]
pub struct ZSetDSTResult {
    /// Seed used
    pub seed: u64,
    /// Total operations executed
    pub total_operations: u64,
    /// Fresh inserts
    pub adds: u64,
    /// Adds hitting an existing member
    pub updates: u64,
    /// Increment operations
    pub incrs: u64,
    /// Single-member removes
    pub removes: u64,
    /// Range deletes (score or rank)
    pub range_deletes: u64,
    /// Trim operations
    pub trims: u64,
    /// Invariant violations found (with operation context)
    pub invariant_violations: Vec<String>,
    /// Last operation before failure (if any)
    pub last_op: Option<ZSetOp>,
}

impl ZSetDSTResult {
    pub fn new(seed: u64) -> Self {
        ZSetDSTResult {
            seed,
            total_operations: 0,
            adds: 0,
            updates: 0,
            incrs: 0,
            removes: 0,
            range_deletes: 0,
            trims: 0,
            invariant_violations: Vec::new(),
            last_op: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} ops ({} adds, {} updates, {} incrs, {} removes, {} range deletes, {} trims), {} violations",
            self.seed,
            self.total_operations,
            self.adds,
            self.updates,
            self.incrs,
            self.removes,
            self.range_deletes,
            self.trims,
            self.invariant_violations.len()
        )
    }
}

/// DST harness for [`ZSet`]
pub struct ZSetDSTHarness {
    config: ZSetDSTConfig,
    rng: ChaCha8Rng,
    zset: ZSet<String>,
    result: ZSetDSTResult,
}

impl ZSetDSTHarness {
    pub fn new(config: ZSetDSTConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        ZSetDSTHarness {
            result: ZSetDSTResult::new(config.seed),
            config,
            rng,
            zset: ZSet::new(),
        }
    }

    /// Create with just a seed (uses default config)
    pub fn with_seed(seed: u64) -> Self {
        Self::new(ZSetDSTConfig::new(seed))
    }

    fn random_member(&mut self) -> String {
        let idx = self.rng.gen_range(0..self.config.num_keys);
        format!("member:{}", idx)
    }

    fn random_score(&mut self) -> i64 {
        self.rng
            .gen_range(-self.config.max_score..=self.config.max_score)
    }

    /// Run a single random operation
    fn run_single_op(&mut self) {
        let roll: f64 = self.rng.gen();
        let c = &self.config;

        if roll < c.remove_prob {
            let member = self.random_member();
            self.result.last_op = Some(ZSetOp::Remove {
                member: member.clone(),
            });
            self.zset.remove(&member);
            self.result.removes += 1;
        } else if roll < c.remove_prob + c.incr_prob {
            let member = self.random_member();
            let delta = self.random_score();
            self.result.last_op = Some(ZSetOp::IncrBy {
                member: member.clone(),
                delta,
            });
            self.zset.incr_by(delta, member);
            self.result.incrs += 1;
        } else if roll < c.remove_prob + c.incr_prob + c.range_delete_prob {
            if self.rng.gen_bool(0.5) {
                let a = self.random_score();
                let b = self.random_score();
                self.result.last_op = Some(ZSetOp::RemoveRangeByScore { start: a, end: b });
                self.zset.remove_range_by_score(ScoreRange::inclusive(a, b));
            } else {
                let len = self.zset.len() as isize;
                let start = self.rng.gen_range(-len.max(1)..len.max(1));
                let end = self.rng.gen_range(-len.max(1)..len.max(1));
                self.result.last_op = Some(ZSetOp::RemoveRangeByRank { start, end });
                self.zset.remove_range_by_rank(start, end);
            }
            self.result.range_deletes += 1;
        } else if roll < c.remove_prob + c.incr_prob + c.range_delete_prob + c.trim_prob {
            let n = self.rng.gen_range(0..=self.config.num_keys);
            let rev = self.rng.gen_bool(0.5);
            self.result.last_op = Some(ZSetOp::Limit { n, rev });
            if rev {
                self.zset.rev_limit(n);
            } else {
                self.zset.limit(n);
            }
            self.result.trims += 1;
        } else {
            let member = self.random_member();
            let score = self.random_score();
            self.result.last_op = Some(ZSetOp::Add {
                member: member.clone(),
                score,
            });
            let existed = self.zset.score(&member).is_some();
            self.zset.add(score, member);
            if existed {
                self.result.updates += 1;
            } else {
                self.result.adds += 1;
            }
        }

        self.result.total_operations += 1;

        // Verify invariants after each operation
        if let Err(violation) = self.check_invariants() {
            self.result.invariant_violations.push(format!(
                "Op #{}: {:?} - {}",
                self.result.total_operations, self.result.last_op, violation
            ));
        }
    }

    /// Check all invariants
    fn check_invariants(&mut self) -> Result<(), String> {
        // Structural validity + index coupling
        self.zset.validate()?;

        // Rank round-trip for one sampled member
        if !self.zset.is_empty() {
            let member = self.random_member();
            if let Some(rank) = self.zset.rank(&member) {
                let entry = self
                    .zset
                    .entry_by_rank(rank as isize)
                    .ok_or_else(|| format!("rank {} has no entry", rank))?;
                if entry.member != member {
                    return Err(format!(
                        "rank round-trip failed: rank({}) = {}, entry_by_rank = {}",
                        member, rank, entry.member
                    ));
                }
                let rev = self
                    .zset
                    .rev_rank(&member)
                    .ok_or_else(|| format!("member {} lost its reverse rank", member))?;
                if rank + rev != self.zset.len() - 1 {
                    return Err(format!(
                        "rank {} + rev_rank {} != len - 1 ({})",
                        rank,
                        rev,
                        self.zset.len() - 1
                    ));
                }
            }
        }

        Ok(())
    }

    /// Run specified number of operations
    pub fn run(&mut self, operations: usize) {
        for _ in 0..operations {
            self.run_single_op();

            // Stop early if we hit a violation
            if !self.result.invariant_violations.is_empty() {
                break;
            }
        }
    }

    /// Get the result
    pub fn result(&self) -> &ZSetDSTResult {
        &self.result
    }

    /// Get the sorted set for inspection
    pub fn zset(&self) -> &ZSet<String> {
        &self.zset
    }
}

/// Run a batch of DST tests with different seeds
pub fn run_zset_batch(
    start_seed: u64,
    num_seeds: usize,
    ops_per_seed: usize,
    config_fn: fn(u64) -> ZSetDSTConfig,
) -> Vec<ZSetDSTResult> {
    (0..num_seeds)
        .map(|i| {
            let seed = start_seed + i as u64;
            let config = config_fn(seed);
            let mut harness = ZSetDSTHarness::new(config);
            harness.run(ops_per_seed);
            harness.result().clone()
        })
        .collect()
}

/// Summarize batch results
pub fn summarize_zset_batch(results: &[ZSetDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed = total - passed;
    let total_ops: u64 = results.iter().map(|r| r.total_operations).sum();

    let mut summary = format!(
        "Sorted Set DST Summary\n\
         ======================\n\
         Seeds: {} total, {} passed, {} failed\n\
         Total operations: {}\n",
        total, passed, failed, total_ops
    );

    if failed > 0 {
        summary.push_str("\nFailed seeds:\n");
        for result in results.iter().filter(|r| !r.is_success()) {
            summary.push_str(&format!("  Seed {}: {}\n", result.seed, result.summary()));
            for violation in &result.invariant_violations {
                summary.push_str(&format!("    - {}\n", violation));
            }
        }
    }

    summary
}
