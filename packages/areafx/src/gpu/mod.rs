pub mod post_processor;
