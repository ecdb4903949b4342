pub mod agglomerative_builder;
pub mod top_down_builder;

pub use agglomerative_builder::*;
pub use top_down_builder::*;

use crate::{Blas, Primitive};

pub trait BvhBuilder {
    fn build(&self, primitives: Vec<Primitive>) -> Blas;
}
