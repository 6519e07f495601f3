//! Shared utility modules used across Satchel components.

pub mod varint;
