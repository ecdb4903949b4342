pub mod aabb;
pub mod build;
pub mod bvh;
pub mod bvh_node;
pub mod config;
pub mod intersector;
pub mod partitioning;
pub mod primitive;
pub mod ray;
pub mod tlas;
pub mod traversal;

pub use crate::bvh::*;
pub use aabb::*;
pub use build::*;
pub use bvh_node::*;
pub use config::*;
pub use intersector::*;
pub use partitioning::*;
pub use primitive::*;
pub use ray::*;
pub use tlas::*;
pub use traversal::{traverse, NodeVisitor};
