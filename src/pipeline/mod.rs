//! Pipeline stages for cover generation.
//!
//! Each submodule implements exactly one step, so each is testable alone.
//!
//! ## Data Flow
//!
//! ```text
//! paginate ──▶ covers ──▶ select ──▶ decode ──▶ compose ──▶ encode
//! (tracks)     (URLs)     (order)    (bitmaps)  (canvas)    (file/upload)
//!                                                  │
//!                                        layout + transform
//! ```
//!
//! 1. [`paginate`]: walk an offset-paginated listing; the only stage that
//!    talks to the listing API
//! 2. [`covers`]: first album-image URL per track, deduplicated
//! 3. [`select`]: shuffle candidates, repeat them when there are too few
//! 4. [`decode`]: load bitmaps, dropping and substituting failures
//! 5. [`compose`]: grid placement, rotation and zoom; uses [`layout`] for
//!    geometry and [`transform`] for pixel work
//! 6. [`encode`]: JPEG/PNG encoding, atomic file write, upload payload

pub mod compose;
pub mod covers;
pub mod decode;
pub mod encode;
pub mod layout;
pub mod paginate;
pub mod select;
pub mod transform;
