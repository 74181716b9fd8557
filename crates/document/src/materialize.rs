use shared::{
    error::{Classify, ErrorCode},
    protocol::ComputeResponse,
};
use thiserror::Error;
use tracing::debug;

use crate::{
    geometry::{decode_item, GeometryError},
    model::{Document, ModelDocument},
};

#[derive(Debug, Error)]
#[error("failed to decode item {index} of branch {branch} in output '{output}': {source}")]
pub struct MaterializeError {
    pub output: String,
    pub branch: String,
    pub index: usize,
    pub source: GeometryError,
}

impl Classify for MaterializeError {
    fn code(&self) -> ErrorCode {
        ErrorCode::Decode
    }
}

/// Clears `doc` and fills it with every item of `response`, in service order.
///
/// Stops at the first item that fails to decode; `doc` then holds only the
/// items decoded before it.
pub fn materialize_into<D: ModelDocument + ?Sized>(
    doc: &mut D,
    response: &ComputeResponse,
) -> Result<(), MaterializeError> {
    doc.clear();
    for output in &response.values {
        for (branch, items) in output.inner_tree.branches() {
            for (index, item) in items.iter().enumerate() {
                let geometry = decode_item(item).map_err(|source| MaterializeError {
                    output: output.param_name.clone(),
                    branch: branch.to_string(),
                    index,
                    source,
                })?;
                doc.insert(geometry);
            }
        }
    }
    debug!(objects = doc.len(), "materialized compute result");
    Ok(())
}

/// Builds a new document from `response`. Nothing partial escapes on failure.
pub fn materialize(response: &ComputeResponse) -> Result<Document, MaterializeError> {
    let mut doc = Document::new();
    materialize_into(&mut doc, response)?;
    Ok(doc)
}
