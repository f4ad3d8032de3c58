use ark_bn254::Fr;
use ark_crypto_primitives::sponge::constraints::CryptographicSpongeVar;
use ark_crypto_primitives::sponge::poseidon::constraints::PoseidonSpongeVar;
use ark_r1cs_std::{
    alloc::AllocVar, boolean::Boolean, eq::EqGadget, fields::fp::FpVar, fields::FieldVar,
    select::CondSelectGadget,
};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use crate::poseidon::{canonical_config, nullifier_hash};

/// R1CS relation: "I know (trapdoor, nullifier) whose commitment sits under
/// `root`, and `nullifier_hash` is derived from my nullifier and this group."
///
/// Public inputs, in allocation order:
/// `[root, nullifier_hash, signal_hash, external_nullifier]`.
#[derive(Clone)]
pub struct MembershipCircuit {
    trapdoor: Option<Fr>,
    nullifier: Option<Fr>,
    siblings: Vec<Option<Fr>>,
    path_indices: Vec<Option<bool>>,
    root: Option<Fr>,
    nullifier_hash: Option<Fr>,
    signal_hash: Option<Fr>,
    external_nullifier: Option<Fr>,
}

impl MembershipCircuit {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        trapdoor: Fr,
        nullifier: Fr,
        siblings: Vec<Fr>,
        path_indices: Vec<bool>,
        root: Fr,
        signal_hash: Fr,
        external_nullifier: Fr,
    ) -> Self {
        Self {
            trapdoor: Some(trapdoor),
            nullifier: Some(nullifier),
            siblings: siblings.into_iter().map(Some).collect(),
            path_indices: path_indices.into_iter().map(Some).collect(),
            root: Some(root),
            nullifier_hash: Some(nullifier_hash(nullifier, external_nullifier)),
            signal_hash: Some(signal_hash),
            external_nullifier: Some(external_nullifier),
        }
    }

    /// Shape-only instance for key generation.
    pub fn blank(depth: usize) -> Self {
        Self {
            trapdoor: None,
            nullifier: None,
            siblings: vec![None; depth],
            path_indices: vec![None; depth],
            root: None,
            nullifier_hash: None,
            signal_hash: None,
            external_nullifier: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    /// Overrides the claimed nullifier hash. Used to build unsatisfiable instances.
    pub fn with_nullifier_hash(mut self, value: Fr) -> Self {
        self.nullifier_hash = Some(value);
        self
    }
}

impl ConstraintSynthesizer<Fr> for MembershipCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let trapdoor = FpVar::new_witness(cs.clone(), || {
            self.trapdoor.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let nullifier = FpVar::new_witness(cs.clone(), || {
            self.nullifier.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let mut siblings = Vec::with_capacity(self.siblings.len());
        for sibling in &self.siblings {
            siblings.push(FpVar::new_witness(cs.clone(), || {
                sibling.ok_or(SynthesisError::AssignmentMissing)
            })?);
        }

        let mut path_indices = Vec::with_capacity(self.path_indices.len());
        for is_right in &self.path_indices {
            path_indices.push(Boolean::new_witness(cs.clone(), || {
                is_right.ok_or(SynthesisError::AssignmentMissing)
            })?);
        }

        let root = FpVar::new_input(cs.clone(), || {
            self.root.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let claimed_nullifier_hash = FpVar::new_input(cs.clone(), || {
            self.nullifier_hash.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let signal_hash = FpVar::new_input(cs.clone(), || {
            self.signal_hash.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let external_nullifier = FpVar::new_input(cs.clone(), || {
            self.external_nullifier.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let commitment = poseidon_hash_circuit(cs.clone(), &[trapdoor, nullifier.clone()])?;

        let computed_root =
            compute_merkle_root_circuit(cs.clone(), &commitment, &siblings, &path_indices)?;
        computed_root.enforce_equal(&root)?;

        let computed_nullifier_hash =
            poseidon_hash_circuit(cs.clone(), &[nullifier, external_nullifier])?;
        computed_nullifier_hash.enforce_equal(&claimed_nullifier_hash)?;

        // Without a constraint the signal input would not be bound to the proof.
        let _signal_square = signal_hash.square()?;

        Ok(())
    }
}

pub fn poseidon_hash_circuit(
    cs: ConstraintSystemRef<Fr>,
    inputs: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    let mut sponge = PoseidonSpongeVar::new(cs, canonical_config());
    sponge.absorb(&inputs)?;

    let output = sponge.squeeze_field_elements(1)?;
    Ok(output[0].clone())
}

pub fn compute_merkle_root_circuit(
    cs: ConstraintSystemRef<Fr>,
    leaf: &FpVar<Fr>,
    siblings: &[FpVar<Fr>],
    path_indices: &[Boolean<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    let mut current = leaf.clone();

    for (sibling, is_right) in siblings.iter().zip(path_indices.iter()) {
        let left = FpVar::conditionally_select(is_right, sibling, &current)?;
        let right = FpVar::conditionally_select(is_right, &current, sibling)?;

        current = poseidon_hash_circuit(cs.clone(), &[left, right])?;
    }

    Ok(current)
}
