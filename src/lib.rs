// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits (thresholds in clippy.toml)
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Plasma fractal generation with a per-pixel parallel evaluator.
//!
//! Heights come from recursive midpoint displacement of a unit square,
//! evaluated independently at every pixel so the whole raster can run as one
//! fragment program. Shading maps heights through a caller-supplied color
//! gradient.
//!
//! # Key entry points
//!
//! - [`session::PlasmaSession`] - owns the resources and coalesces redraws
//! - [`fractal`] - the height function, gradient shading and renderers
//! - [`normal_table`] - the standard-normal lookup table
//! - [`gpu::manager::ResourceManager`] - graphics resource lifetimes and
//!   off-screen rendering
//! - [`options::PlasmaOptions`] - TOML configuration
//!
//! # Architecture
//!
//! The manager is generic over a [`gpu::backend::Backend`]. The wgpu backend
//! runs the WGSL programs on a GPU; the software backend validates the same
//! WGSL and runs host kernels per pixel with rayon, producing the same
//! bytes as [`fractal::render_reference`].

pub mod error;
pub mod fractal;
pub mod gpu;
pub mod normal_table;
pub mod options;
pub mod session;
