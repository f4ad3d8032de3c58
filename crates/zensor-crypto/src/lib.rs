//! Cryptographic core of zensor: Poseidon hashing, device identities,
//! fixed-depth membership trees and the Groth16 membership circuit.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod circuit;
pub mod groth16;
pub mod identity;
pub mod membership_tree;
pub mod poseidon;
pub mod sensor;

pub use circuit::MembershipCircuit;
pub use groth16::{MembershipKeys, MembershipWitness, ZkProof, CIRCUIT_VERSION};
pub use identity::Identity;
pub use membership_tree::{zero_leaf, MembershipProof, MembershipTree};
pub use poseidon::{
    external_nullifier, field_hash_to_decimal, field_hash_to_fr, fr_to_field_hash, hash_to_field,
    parse_field_hash, signal_hash,
};
pub use sensor::{extract_puf_seed, sensor_signal, SensorLog, SensorReading};

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
