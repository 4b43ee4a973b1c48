//! Owned PROJ operation handle that transforms full x/y/z coordinates
//!
//! `proj::Proj` keeps its `PJ` pointer private and only hands x/y to
//! `proj_trans`, so vertical steps (geoid grids, `zoff`) would never touch
//! z. This handle talks to `proj-sys` directly with complete `PJ_COORD`s.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use log::debug;
use proj_sys::{
    proj_as_proj_string, proj_context_create, proj_context_destroy, proj_context_errno,
    proj_context_errno_string, proj_create, proj_create_crs_to_crs,
    proj_create_operation_factory_context, proj_create_operations, proj_destroy, proj_errno,
    proj_errno_reset, proj_list_destroy, proj_list_get, proj_list_get_count,
    proj_normalize_for_visualization, proj_operation_factory_context_destroy, proj_pj_info,
    proj_trans, proj_trans_array, PJconsts, PJ_CONTEXT, PJ_COORD, PJ_DIRECTION_PJ_FWD,
    PJ_PROJ_STRING_TYPE_PJ_PROJ_5, PJ_XYZT,
};

use crate::error::{Error, Result};

/// Definition PROJ reports for a CRS-to-CRS object that picks among several
/// candidate operations per point
pub const DEFERRED_DEFINITION: &str = "unavailable until proj_trans is called";

/// A PROJ transformation object with its own context
pub struct Operation {
    ctx: *mut PJ_CONTEXT,
    pj: *mut PJconsts,
}

// The context and the object are owned by this handle and never shared.
unsafe impl Send for Operation {}

/// Destroys an intermediate PROJ object when it goes out of scope
struct Owned(*mut PJconsts);

impl Drop for Owned {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe {
                proj_destroy(self.0);
            }
        }
    }
}

fn c_text(text: &str) -> Result<CString> {
    CString::new(text)
        .map_err(|_| Error::Descriptor(format!("CRS definition contains a NUL byte: {:?}", text)))
}

unsafe fn owned_string(raw: *const c_char) -> Option<String> {
    if raw.is_null() {
        None
    } else {
        Some(CStr::from_ptr(raw).to_string_lossy().into_owned())
    }
}

fn last_error(ctx: *mut PJ_CONTEXT) -> String {
    unsafe {
        let errno = proj_context_errno(ctx);
        owned_string(proj_context_errno_string(ctx, errno))
            .unwrap_or_else(|| format!("PROJ error {}", errno))
    }
}

fn new_context() -> Result<*mut PJ_CONTEXT> {
    let ctx = unsafe { proj_context_create() };
    if ctx.is_null() {
        return Err(Error::Projection("Failed to create a PROJ context".to_string()));
    }
    Ok(ctx)
}

/// Runs `build` on a fresh context and wraps the object it returns
///
/// The context is released again when `build` fails.
fn with_context<F>(build: F) -> Result<Operation>
where
    F: FnOnce(*mut PJ_CONTEXT) -> Result<*mut PJconsts>,
{
    let ctx = new_context()?;
    match build(ctx) {
        Ok(pj) => Ok(Operation { ctx, pj }),
        Err(e) => {
            unsafe {
                proj_context_destroy(ctx);
            }
            Err(e)
        }
    }
}

fn created(ctx: *mut PJ_CONTEXT, pj: *mut PJconsts, what: &str) -> Result<*mut PJconsts> {
    if pj.is_null() {
        Err(Error::Projection(format!("Failed to create {}: {}", what, last_error(ctx))))
    } else {
        Ok(pj)
    }
}

fn xyz(x: f64, y: f64, z: f64) -> PJ_COORD {
    PJ_COORD {
        xyzt: PJ_XYZT { x, y, z, t: f64::INFINITY },
    }
}

impl Operation {
    /// Creates an operation from a PROJ string such as a `+proj=pipeline`
    pub fn from_definition(definition: &str) -> Result<Self> {
        let text = c_text(definition)?;
        with_context(|ctx| {
            let pj = unsafe { proj_create(ctx, text.as_ptr()) };
            created(ctx, pj, &format!("operation '{}'", definition))
        })
    }

    /// Creates the CRS-to-CRS operation in x/easting-first axis order
    pub fn between(source: &str, target: &str) -> Result<Self> {
        let source_text = c_text(source)?;
        let target_text = c_text(target)?;
        with_context(|ctx| {
            let raw = Owned(unsafe {
                proj_create_crs_to_crs(
                    ctx,
                    source_text.as_ptr(),
                    target_text.as_ptr(),
                    ptr::null_mut(),
                )
            });
            created(ctx, raw.0, &format!("operation from {} to {}", source, target))?;
            let pj = unsafe { proj_normalize_for_visualization(ctx, raw.0) };
            created(ctx, pj, "normalised operation")
        })
    }

    /// Creates the first candidate operation PROJ ranks for a CRS pair
    ///
    /// Candidates are sorted by PROJ with the most accurate operation usable
    /// over the widest area first.
    pub fn preferred(source: &str, target: &str) -> Result<Self> {
        let source_text = c_text(source)?;
        let target_text = c_text(target)?;
        with_context(|ctx| unsafe {
            let source_crs = Owned(proj_create(ctx, source_text.as_ptr()));
            created(ctx, source_crs.0, &format!("CRS {}", source))?;
            let target_crs = Owned(proj_create(ctx, target_text.as_ptr()));
            created(ctx, target_crs.0, &format!("CRS {}", target))?;

            let factory = proj_create_operation_factory_context(ctx, ptr::null());
            if factory.is_null() {
                return Err(Error::Projection(format!(
                    "Failed to create operation factory: {}",
                    last_error(ctx)
                )));
            }
            let list = proj_create_operations(ctx, source_crs.0, target_crs.0, factory);
            proj_operation_factory_context_destroy(factory);
            if list.is_null() {
                return Err(Error::Projection(format!(
                    "No operations from {} to {}: {}",
                    source,
                    target,
                    last_error(ctx)
                )));
            }

            let count = proj_list_get_count(list);
            let first = Owned(if count > 0 {
                proj_list_get(ctx, list, 0)
            } else {
                ptr::null_mut()
            });
            proj_list_destroy(list);
            created(ctx, first.0, &format!("operation from {} to {}", source, target))?;
            debug!("{} candidate operations from {} to {}", count, source, target);

            let pj = proj_normalize_for_visualization(ctx, first.0);
            created(ctx, pj, "normalised operation")
        })
    }

    /// The definition PROJ reports for this object
    ///
    /// For a CRS pair with several candidates this is [`DEFERRED_DEFINITION`].
    pub fn definition(&self) -> Option<String> {
        unsafe { owned_string(proj_pj_info(self.pj).definition) }
    }

    /// Exports the operation as a PROJ string
    pub fn proj_string(&self) -> Option<String> {
        unsafe {
            owned_string(proj_as_proj_string(
                self.ctx,
                self.pj,
                PJ_PROJ_STRING_TYPE_PJ_PROJ_5,
                ptr::null(),
            ))
        }
    }

    /// Transforms one point
    pub fn transform(&self, x: f64, y: f64, z: f64) -> Result<(f64, f64, f64)> {
        unsafe {
            proj_errno_reset(self.pj);
            let out = proj_trans(self.pj, PJ_DIRECTION_PJ_FWD, xyz(x, y, z)).xyzt;
            let errno = proj_errno(self.pj);
            if errno != 0 || !out.x.is_finite() || !out.y.is_finite() {
                return Err(Error::Projection(format!(
                    "Transformation of ({}, {}, {}) failed: {}",
                    x,
                    y,
                    z,
                    last_error(self.ctx)
                )));
            }
            Ok((out.x, out.y, out.z))
        }
    }

    /// Transforms points in place in one `proj_trans_array` call
    ///
    /// When the batch reports an error every point is retried on its own.
    /// Points PROJ cannot transform become NaN. Returns how many points
    /// were transformed.
    pub fn transform_array(&self, points: &mut [(f64, f64, f64)]) -> usize {
        if points.is_empty() {
            return 0;
        }

        let mut coords: Vec<PJ_COORD> = points.iter().map(|&(x, y, z)| xyz(x, y, z)).collect();
        let status = unsafe {
            proj_errno_reset(self.pj);
            let status =
                proj_trans_array(self.pj, PJ_DIRECTION_PJ_FWD, coords.len(), coords.as_mut_ptr());
            if status == 0 {
                proj_errno(self.pj)
            } else {
                status
            }
        };

        if status == 0 {
            let mut transformed = 0;
            for (point, coord) in points.iter_mut().zip(coords.iter()) {
                let out = unsafe { coord.xyzt };
                if out.x.is_finite() && out.y.is_finite() {
                    *point = (out.x, out.y, out.z);
                    transformed += 1;
                } else {
                    *point = (f64::NAN, f64::NAN, f64::NAN);
                }
            }
            return transformed;
        }

        debug!(
            "batch of {} points failed ({}), retrying point by point",
            points.len(),
            last_error(self.ctx)
        );
        let mut transformed = 0;
        for point in points.iter_mut() {
            match self.transform(point.0, point.1, point.2) {
                Ok(out) => {
                    *point = out;
                    transformed += 1;
                }
                Err(_) => *point = (f64::NAN, f64::NAN, f64::NAN),
            }
        }
        transformed
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        unsafe {
            proj_destroy(self.pj);
            proj_context_destroy(self.ctx);
        }
    }
}
