//! Integration tests that fit realistic problems through the public front end

mod nist_strd;
mod real_world;
