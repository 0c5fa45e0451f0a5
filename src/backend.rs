//! Remote-procedure boundary to the curation backend.
//!
//! Every call is a single request/response pair that may fail. Callers treat
//! a failure as "abort this operation, keep the table as it was".

use log::{debug, warn};
use serde_json::{Value, json};

use crate::error::{EtlError, EtlResult};

pub const VALIDATE_VARIANT: &str = "validate_variant";

pub trait Backend {
    fn invoke(&mut self, command: &str, args: &Value) -> EtlResult<Value>;
}

/// Used when no backend process is attached; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBackend;

impl Backend for OfflineBackend {
    fn invoke(&mut self, command: &str, _args: &Value) -> EtlResult<Value> {
        warn!("Backend call '{command}' attempted while offline");
        Err(EtlError::external(command, "backend is not connected"))
    }
}

/// Outcome of validating one variant string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantCheck {
    Valid { variant_key: String },
    Rejected { message: String },
}

/// Asks the backend to validate `variant` in the context of a gene and
/// transcript. A rejected variant is data; a failed call is an error.
pub fn validate_variant(
    backend: &mut dyn Backend,
    variant: &str,
    gene_symbol: &str,
    transcript: &str,
) -> EtlResult<VariantCheck> {
    let args = json!({
        "variant": variant,
        "gene": gene_symbol,
        "transcript": transcript,
    });
    let reply = backend.invoke(VALIDATE_VARIANT, &args)?;
    debug!("validate_variant({variant}) -> {reply}");
    if let Some(key) = reply.get("variantKey").and_then(Value::as_str) {
        return Ok(VariantCheck::Valid {
            variant_key: key.to_string(),
        });
    }
    if let Some(message) = reply.get("error").and_then(Value::as_str) {
        return Ok(VariantCheck::Rejected {
            message: message.to_string(),
        });
    }
    Err(EtlError::external(
        VALIDATE_VARIANT,
        format!("unexpected reply {reply}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Backend for Echo {
        fn invoke(&mut self, _command: &str, args: &Value) -> EtlResult<Value> {
            let variant = args["variant"].as_str().unwrap_or_default();
            if variant.starts_with("c.") {
                let gene = args["gene"].as_str().unwrap();
                Ok(json!({ "variantKey": format!("{gene}_{variant}") }))
            } else {
                Ok(json!({ "error": "not HGVS" }))
            }
        }
    }

    #[test]
    fn replies_map_to_checks() {
        let mut backend = Echo;
        assert_eq!(
            validate_variant(&mut backend, "c.12A>G", "FBN1", "NM_000138.5").unwrap(),
            VariantCheck::Valid {
                variant_key: "FBN1_c.12A>G".to_string()
            }
        );
        assert!(matches!(
            validate_variant(&mut backend, "12A>G", "FBN1", "NM_000138.5").unwrap(),
            VariantCheck::Rejected { .. }
        ));
    }

    #[test]
    fn offline_backend_fails_every_call() {
        let err = validate_variant(&mut OfflineBackend, "c.1A>G", "X", "Y").unwrap_err();
        assert!(matches!(err, EtlError::External { .. }));
    }
}
