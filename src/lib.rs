#![allow(missing_docs)]

pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod distributed;
pub mod ema;
pub mod error;
pub mod function;
pub mod loss;
pub mod predictor;
pub mod render;
pub mod scene;
pub mod tracking;
pub mod trainer;
pub mod visualize;

#[cfg(test)]
pub(crate) mod fixture;
