//! OpenDAL Operator factory for the encrypted staging repo

use std::path::Path;

use genc_core::{GencError, GencResult};
use opendal::Operator;

/// Build an OpenDAL Operator rooted at a local directory (the staging clone).
pub fn build_local_operator(root: &Path) -> GencResult<Operator> {
    let root = root
        .to_str()
        .ok_or_else(|| {
            GencError::Config(format!("staging path is not UTF-8: {}", root.display()))
        })?;

    // opendal 0.55: builders use the consuming pattern
    let builder = opendal::services::Fs::default().root(root);

    let op = Operator::new(builder)?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(3)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}

/// In-memory operator, for tests and dry runs.
pub fn memory_operator() -> GencResult<Operator> {
    Ok(Operator::new(opendal::services::Memory::default())?.finish())
}
