mod client;
mod codepipeline;
mod logs;

pub use client::{AwsCli, AwsSettings};
