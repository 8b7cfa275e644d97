use crate::config::AppConfig;
use crate::errors::ApiError;

pub(crate) fn validate_query_vector(vector: &[f32], config: &AppConfig) -> Result<(), ApiError> {
    if vector.is_empty() {
        return Err(ApiError::invalid_argument("vector must not be empty"));
    }
    if vector.len() > config.max_dimension {
        return Err(ApiError::invalid_argument(format!(
            "vector dimension {} exceeds configured maximum {}",
            vector.len(),
            config.max_dimension
        )));
    }
    if config.strict_finite {
        if let Some(index) = first_non_finite_index(vector) {
            return Err(ApiError::invalid_argument(format!(
                "vector contains a non-finite value at index {index}"
            )));
        }
    }
    Ok(())
}

fn first_non_finite_index(values: &[f32]) -> Option<usize> {
    values.iter().position(|value| !value.is_finite())
}
