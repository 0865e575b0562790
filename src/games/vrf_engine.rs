use crate::errors::RandomnessError;
use crate::games::random::{check_bound, Draw, RandomSource};
use crate::games::types::VrfBundle;
use schnorrkel::vrf::{VRFInOut, VRFPreOut, VRFProof};
use schnorrkel::{signing_context, Keypair, PublicKey};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const VRF_SIGNING_CONTEXT: &[u8] = b"bet-ledger-outcome";
const VRF_OUTPUT_CONTEXT: &[u8] = b"bet-ledger-draw";

/// Verifiable random source: each draw is a schnorrkel VRF evaluation over
/// the draw input, so anyone holding the public key can recompute it.
pub struct VrfRandom {
    keypair: Arc<Keypair>,
}

impl VrfRandom {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// Create a new VRF source with a random keypair
    pub fn new_random() -> Self {
        use rand_core::OsRng;
        Self::new(Keypair::generate_with(OsRng))
    }

    /// Evaluate the VRF over `input` and return the bundle plus the draw
    pub fn evaluate(&self, input: &str, bound: u32) -> Result<Draw, RandomnessError> {
        check_bound(bound)?;

        let ctx = signing_context(VRF_SIGNING_CONTEXT);
        let (inout, proof, _) = self.keypair.vrf_sign(ctx.bytes(input.as_bytes()));
        let value = draw_from_inout(&inout, bound);

        Ok(Draw {
            value,
            proof: Some(VrfBundle {
                vrf_output: hex::encode(inout.to_preout().to_bytes()),
                vrf_proof: hex::encode(proof.to_bytes()),
                public_key: self.public_key_hex(),
                input_message: input.to_string(),
            }),
        })
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public.to_bytes())
    }
}

impl RandomSource for VrfRandom {
    fn draw(&self, input: &str, bound: u32) -> Result<Draw, RandomnessError> {
        self.evaluate(input, bound)
    }

    fn name(&self) -> &'static str {
        "vrf"
    }
}

/// Verify a bundle and recompute the draw it commits to.
///
/// Returns `Ok(None)` when the proof does not verify against the bundle's
/// public key and input message.
pub fn verify_draw(bundle: &VrfBundle, bound: u32) -> Result<Option<u32>, RandomnessError> {
    check_bound(bound)?;

    let public_key_bytes = decode_hex("public_key", &bundle.public_key)?;
    let preout_bytes = decode_hex("vrf_output", &bundle.vrf_output)?;
    let proof_bytes = decode_hex("vrf_proof", &bundle.vrf_proof)?;

    let public_key = PublicKey::from_bytes(&public_key_bytes).map_err(|e| RandomnessError::Malformed {
        field: "public_key",
        reason: format!("{:?}", e),
    })?;
    let preout = VRFPreOut::from_bytes(&preout_bytes).map_err(|e| RandomnessError::Malformed {
        field: "vrf_output",
        reason: format!("{:?}", e),
    })?;
    let proof = VRFProof::from_bytes(&proof_bytes).map_err(|e| RandomnessError::Malformed {
        field: "vrf_proof",
        reason: format!("{:?}", e),
    })?;

    let ctx = signing_context(VRF_SIGNING_CONTEXT);
    match public_key.vrf_verify(ctx.bytes(bundle.input_message.as_bytes()), &preout, &proof) {
        Ok((inout, _)) => Ok(Some(draw_from_inout(&inout, bound))),
        Err(_) => Ok(None),
    }
}

fn draw_from_inout(inout: &VRFInOut, bound: u32) -> u32 {
    let bytes: [u8; 32] = inout.make_bytes(VRF_OUTPUT_CONTEXT);
    reduce(&bytes, bound)
}

/// Map 32 random bytes onto `0..bound`. The 64-bit reduction keeps modulo
/// bias below 2^-60 for the small bounds games use.
fn reduce(bytes: &[u8; 32], bound: u32) -> u32 {
    let digest = Sha256::digest(bytes);
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(word) % u64::from(bound)) as u32
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, RandomnessError> {
    hex::decode(value).map_err(|e| RandomnessError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}
