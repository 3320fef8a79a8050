use crate::config::Config;
use crate::error::{Result, ScoliaError, ValidationError};

const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every failure.
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_indexing(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_router(config, &mut errors);
        Self::validate_rewriter(config, &mut errors);
        Self::validate_session(config, &mut errors);
        Self::validate_pipeline(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ScoliaError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_indexing(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.indexing.vector_dim == 0 {
            errors.push(ValidationError::new(
                "indexing.vector_dim",
                "Vector dimension must be greater than 0",
            ));
        }

        if config.indexing.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.indexing.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }

        if config.indexing.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.candidate_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.candidate_multiplier",
                "Candidate multiplier must be greater than 0",
            ));
        }

        if retrieval.rrf_k <= 0.0 {
            errors.push(ValidationError::new(
                "retrieval.rrf_k",
                "RRF K must be positive",
            ));
        }

        for (path, weight) in [
            ("retrieval.technical_lexical_weight", retrieval.technical_lexical_weight),
            ("retrieval.default_lexical_weight", retrieval.default_lexical_weight),
        ] {
            if !(0.0..1.0).contains(&weight) || weight == 0.0 {
                errors.push(ValidationError::new(
                    path,
                    format!("Lexical weight must be in (0, 1), got {}", weight),
                ));
            }
        }

        if retrieval.rerank_candidates == 0 {
            errors.push(ValidationError::new(
                "retrieval.rerank_candidates",
                "Rerank candidate count must be greater than 0",
            ));
        }

        if retrieval.enable_reranking && retrieval.reranker_model.is_empty() {
            errors.push(ValidationError::new(
                "retrieval.reranker_model",
                "Reranker model cannot be empty when reranking is enabled",
            ));
        }
    }

    fn validate_router(config: &Config, errors: &mut Vec<ValidationError>) {
        let router = &config.router;

        let sum = router.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            errors.push(ValidationError::new(
                "router.weights",
                format!("Signal weights must sum to 1.0, got {}", sum),
            ));
        }

        for (path, value) in [
            ("router.retrieve_threshold", router.retrieve_threshold),
            ("router.weak_probe_threshold", router.weak_probe_threshold),
            ("router.weak_probe_penalty", router.weak_probe_penalty),
            (
                "router.weak_probe_penalty_structured",
                router.weak_probe_penalty_structured,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ValidationError::new(
                    path,
                    format!("Value must be in [0, 1], got {}", value),
                ));
            }
        }

        if router.probe_k == 0 {
            errors.push(ValidationError::new(
                "router.probe_k",
                "Probe k must be greater than 0",
            ));
        }

        for (i, entry) in router.canonical.iter().enumerate() {
            if entry.phrase.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("router.canonical[{}].phrase", i),
                    "Canonical phrase cannot be empty",
                ));
            }
            if entry.chapter.trim().is_empty() || entry.block_id.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("router.canonical[{}]", i),
                    "Canonical target needs both a chapter and a block_id",
                ));
            }
        }
    }

    fn validate_rewriter(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.rewriter.timeout_ms == 0 {
            errors.push(ValidationError::new(
                "rewriter.timeout_ms",
                "Rewriter timeout must be greater than 0",
            ));
        }

        if !(1..=2).contains(&config.rewriter.context_turns) {
            errors.push(ValidationError::new(
                "rewriter.context_turns",
                format!(
                    "Context turns must be 1 or 2, got {}",
                    config.rewriter.context_turns
                ),
            ));
        }
    }

    fn validate_session(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.session.history_cap == 0 {
            errors.push(ValidationError::new(
                "session.history_cap",
                "History cap must be greater than 0",
            ));
        }
    }

    fn validate_pipeline(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.pipeline.retrieval_k == 0 {
            errors.push(ValidationError::new(
                "pipeline.retrieval_k",
                "Retrieval k must be greater than 0",
            ));
        }

        if config.pipeline.summary_chars == 0 {
            errors.push(ValidationError::new(
                "pipeline.summary_chars",
                "Summary length must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = Config::default();
        config.router.weights.similarity = 0.9;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = Config::default();
        config.router.retrieve_threshold = 1.5;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_errors_are_collected() {
        let mut config = Config::default();
        config.session.history_cap = 0;
        config.pipeline.retrieval_k = 0;

        match ConfigValidator::validate(&config) {
            Err(ScoliaError::ConfigValidation { errors }) => {
                assert_eq!(errors.len(), 2);
            }
            other => panic!("Expected validation failure, got {:?}", other.err()),
        }
    }
}
