use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("mesh {mesh} has not been set")]
    MissingMesh { mesh: usize },
    #[error("instance {instance} has not been set")]
    MissingInstance { instance: usize },
    #[error("primitive {primitive} of mesh {mesh} is unbounded, add planes with add_plane")]
    UnboundedPrimitive { mesh: usize, primitive: usize },
    #[error("transform of instance {instance} is not invertible")]
    SingularTransform { instance: usize },
}
