//! Build descriptor generation, contract checks, bundling and eject for imgstore.
//!
//! # Build pipeline
//!
//! ```text
//! imgstore build
//!   1. Context     ── BuildContext::open()  (fails fast without Cargo.toml)
//!   2. Dirty check ── git status --porcelain (skip with --allow-dirty)
//!   3. Descriptor  ── ejected .imgstore/Dockerfile or DescriptorGenerator::render()
//!   4. Contract    ── Descriptor::validate()
//!   5. Bundle      ── git ls-files → .imgstore-bundle/
//!   6. Layer keys  ── LayerKeys::compute() vs .imgstore/layers.json
//!   7. Image       ── docker build .imgstore-bundle/
//! ```
//!
//! # Descriptor layout
//!
//! | Stage | Sees | Produces |
//! |-------|------|----------|
//! | chef | base image | cargo-chef |
//! | planner | whole context | `recipe.json` (manifests only) |
//! | cacher | `recipe.json` | compiled dependencies |
//! | builder | dependencies + whole context | entry binary |
//! | runtime | binary + context | `/app`, `images/`, `EXPOSE`, `CMD` |

pub mod bundle;
pub mod contract;
pub mod descriptor;
pub mod eject;
pub mod layers;
pub mod parse;

pub use contract::{ContractViolation, validate_dockerfile};
pub use descriptor::{Descriptor, DescriptorGenerator, Instruction, Stage};
pub use layers::{LayerKeys, LayerReport};
pub use parse::ParseError;
