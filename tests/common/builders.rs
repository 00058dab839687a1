//! Test data builders for pipeline configs and inputs

use enrich_rs::config::PipelineConfig;
use enrich_rs::{FailurePolicy, Identifier, Result};

/// Builder for small pipeline configs
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new(workers: usize) -> Self {
        Self {
            config: PipelineConfig {
                worker_count: workers,
                work_queue_capacity: 8,
                result_queue_capacity: 8,
                failure_policy: FailurePolicy::Skip,
            },
        }
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.work_queue_capacity = capacity;
        self.config.result_queue_capacity = capacity;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

/// `count` identifiers named `tt0000000`, `tt0000001`, ...
pub fn identifiers(count: usize) -> Vec<Result<Identifier>> {
    (0..count)
        .map(|i| Ok(Identifier::new(format!("tt{:07}", i))))
        .collect()
}

/// Identifiers from string literals
pub fn ids(values: &[&str]) -> Vec<Result<Identifier>> {
    values.iter().map(|v| Ok(Identifier::new(*v))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = PipelineConfigBuilder::new(3)
            .queue_capacity(2)
            .failure_policy(FailurePolicy::Marker)
            .build();

        assert_eq!(config.worker_count, 3);
        assert_eq!(config.work_queue_capacity, 2);
        assert_eq!(config.failure_policy, FailurePolicy::Marker);
    }
}
