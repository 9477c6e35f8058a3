pub mod roamify_client;
