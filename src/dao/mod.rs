/// Hand-over of final room results to the persistence collaborator.
pub mod results;
