//! Domain types shared by the update engine and its consumers.

pub mod model;
