pub mod cluster;
pub mod ctfidf;
pub mod embed;
pub mod model;
pub mod reduce;

pub use model::{fit_documents, FitOptions, FittedTopicModel, TopicAssignment, TopicId};
