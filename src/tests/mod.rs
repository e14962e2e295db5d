mod support;

mod cache_tests;
mod db_tests;
mod events_tests;
mod normalize_tests;
mod packet_tests;
mod pipeline_tests;
mod subscription_tests;
mod validation_tests;
