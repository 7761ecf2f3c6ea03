use crate::error::{Result, ScatterError};
use crate::types::{PlacementStrategy, ProviderInfo};

/// Assigns chunks to providers at version-creation time.
///
/// Assignments are computed once per version and never migrate; only
/// providers currently marked live participate.
#[derive(Clone, Copy)]
pub struct PlacementPolicy {
    strategy: PlacementStrategy,
}

impl PlacementPolicy {
    pub fn new(strategy: PlacementStrategy) -> Self {
        Self { strategy }
    }

    /// Choose one provider id per chunk.
    ///
    /// Never assigns two chunks of the same version to one provider unless
    /// there are more chunks than live providers.
    pub fn assign(&self, chunk_count: usize, live: &[ProviderInfo]) -> Result<Vec<i64>> {
        if live.is_empty() {
            return Err(ScatterError::NoProvidersAvailable);
        }
        match self.strategy {
            PlacementStrategy::RoundRobin => Ok((0..chunk_count)
                .map(|i| live[i % live.len()].id)
                .collect()),
            PlacementStrategy::Weighted => Ok(weighted_assign(chunk_count, live)),
        }
    }

    /// Pick a substitute after `failed` exhausted its retries: the next live
    /// provider that is not the one that just failed.
    pub fn reassign(&self, failed: i64, live: &[ProviderInfo]) -> Option<i64> {
        let pos = live.iter().position(|p| p.id == failed).unwrap_or(0);
        live.iter()
            .cycle()
            .skip(pos + 1)
            .take(live.len())
            .find(|p| p.id != failed)
            .map(|p| p.id)
    }
}

/// Weighted assignment. While chunks still fit on distinct providers the
/// heaviest ones are used first; past that point assignment cycles through a
/// cumulative-weight wheel.
fn weighted_assign(chunk_count: usize, live: &[ProviderInfo]) -> Vec<i64> {
    let mut by_weight: Vec<&ProviderInfo> = live.iter().collect();
    by_weight.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.id.cmp(&b.id)));

    let distinct = chunk_count.min(by_weight.len());
    let mut out: Vec<i64> = by_weight[..distinct].iter().map(|p| p.id).collect();

    if chunk_count > by_weight.len() {
        let mut cumulative = Vec::with_capacity(live.len());
        let mut total = 0u64;
        for p in live {
            total += p.weight.max(1) as u64;
            cumulative.push(total);
        }
        for i in out.len()..chunk_count {
            let point = (i as u64) % total;
            let idx = cumulative.iter().position(|&w| point < w).unwrap_or(0);
            out.push(live[idx].id);
        }
    }
    out
}
