use crate::common::types::{RandomWord, RoundId};
use crate::errors::OracleError;
use schnorrkel::context::SigningContext;
use schnorrkel::vrf::{VRFPreOut, VRFProof};
use schnorrkel::{Keypair, PublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const VRF_SIGNING_CONTEXT: &[u8] = b"salad-round";

/// Everything needed to re-check a delivered random word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfBundle {
    /// SHA-256 of `pre_output`, the word handed to the game
    pub output: String,
    pub pre_output: String,
    pub proof: String,
    pub public_key: String,
    pub input_message: String,
}

impl VrfBundle {
    pub fn word(&self) -> Result<RandomWord, OracleError> {
        RandomWord::from_hex(&self.output)
            .map_err(|e| OracleError::Vrf(format!("Invalid VRF output hex: {}", e)))
    }
}

/// Schnorrkel-backed randomness for round settlement
pub struct VrfEngine {
    keypair: Arc<Keypair>,
}

impl VrfEngine {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// Engine with a fresh keypair
    pub fn new_random() -> Self {
        use rand_core::OsRng;
        Self::new(Keypair::generate_with(OsRng))
    }

    /// Deterministic engine for reproducible simulations
    pub fn from_seed(seed: u64) -> Self {
        use rand::{rngs::StdRng, SeedableRng};
        Self::new(Keypair::generate_with(StdRng::seed_from_u64(seed)))
    }

    pub fn input_message(round_id: RoundId, context: &str) -> String {
        format!("{}:{}", context, round_id)
    }

    pub fn generate(&self, round_id: RoundId, context: &str) -> VrfBundle {
        let input_message = Self::input_message(round_id, context);

        let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
        let (in_out, proof, _) = self.keypair.vrf_sign(ctx.bytes(input_message.as_bytes()));
        let pre_output = in_out.to_preout().to_bytes();
        let output = RandomWord::digest(&pre_output);

        VrfBundle {
            output: output.to_hex(),
            pre_output: hex::encode(pre_output),
            proof: hex::encode(proof.to_bytes()),
            public_key: self.public_key_hex(),
            input_message,
        }
    }

    /// Check the VRF proof over `expected_input` and the output derivation.
    pub fn verify_bundle(bundle: &VrfBundle, expected_input: &str) -> Result<bool, OracleError> {
        if bundle.input_message != expected_input {
            return Ok(false);
        }

        let output = bundle.word()?;
        let pre_output_bytes = hex::decode(&bundle.pre_output)
            .map_err(|e| OracleError::Vrf(format!("Invalid VRF pre-output hex: {}", e)))?;
        let proof_bytes = hex::decode(&bundle.proof)
            .map_err(|e| OracleError::Vrf(format!("Invalid VRF proof hex: {}", e)))?;
        let public_key_bytes = hex::decode(&bundle.public_key)
            .map_err(|e| OracleError::Vrf(format!("Invalid public key hex: {}", e)))?;

        let public_key = PublicKey::from_bytes(&public_key_bytes)
            .map_err(|e| OracleError::Vrf(format!("Invalid public key: {:?}", e)))?;
        let pre_output = VRFPreOut::from_bytes(&pre_output_bytes)
            .map_err(|e| OracleError::Vrf(format!("Invalid VRF pre-output: {:?}", e)))?;
        let proof = VRFProof::from_bytes(&proof_bytes)
            .map_err(|e| OracleError::Vrf(format!("Invalid VRF proof: {:?}", e)))?;

        let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
        if public_key
            .vrf_verify(ctx.bytes(expected_input.as_bytes()), &pre_output, &proof)
            .is_err()
        {
            return Ok(false);
        }

        let computed = Sha256::digest(&pre_output_bytes);
        Ok(computed.as_slice() == output.as_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_and_verification() {
        let engine = VrfEngine::new_random();
        let bundle = engine.generate(7, "salad");

        assert_eq!(bundle.input_message, "salad:7");
        assert!(VrfEngine::verify_bundle(&bundle, "salad:7").unwrap());
        assert!(!VrfEngine::verify_bundle(&bundle, "salad:8").unwrap());
    }

    #[test]
    fn test_same_input_same_word() {
        let engine = VrfEngine::from_seed(42);
        let first = engine.generate(3, "salad").word().unwrap();
        let second = engine.generate(3, "salad").word().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tampered_output_rejected() {
        let engine = VrfEngine::new_random();
        let mut bundle = engine.generate(1, "salad");
        bundle.output = hex::encode([0xff; 32]);

        assert!(!VrfEngine::verify_bundle(&bundle, "salad:1").unwrap());
    }

    #[test]
    fn test_bundle_from_other_key_rejected() {
        let bundle = VrfEngine::from_seed(1).generate(1, "salad");
        let mut forged = VrfEngine::from_seed(2).generate(1, "salad");
        forged.public_key = bundle.public_key.clone();

        assert!(!VrfEngine::verify_bundle(&forged, "salad:1").unwrap());
    }

    #[test]
    fn test_malformed_proof_is_an_error() {
        let engine = VrfEngine::new_random();
        let mut bundle = engine.generate(1, "salad");
        bundle.proof = "zz".to_string();

        assert!(matches!(
            VrfEngine::verify_bundle(&bundle, "salad:1"),
            Err(OracleError::Vrf(_))
        ));
    }
}
