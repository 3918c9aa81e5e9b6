mod http_service;

pub use http_service::{parse_generation_body, parse_review_body, HttpExerciseService};
