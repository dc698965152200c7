//! Exposing native data buffers to Python.
//!
//! A buffer is handed over through a [`NativeBuffer`], a small Python object
//! implementing the buffer protocol over the native memory: `float64`
//! items, one-dimensional for scalar data, `(vertices, components)` for
//! vector data. Python sees a `memoryview` of it, or a numpy array when numpy
//! is available; both alias the native memory. Source buffers are read-only,
//! target buffers writable.
//!
//! Empty buffers are copied into Python lists instead and copied back into
//! the target after the call.
//!
//! The exporter counts the buffer exports it has handed out. CPython keeps
//! an export open for as long as any view derived from it is alive, so a
//! non-zero count once the call is over means the module kept the buffer.
//! The exporter is revoked when the view is finished and refuses new exports
//! from then on.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use pyo3::exceptions::PyBufferError;
use pyo3::ffi;
use pyo3::prelude::*;
use pyo3::types::{PyList, PyMemoryView, PyModule};

const FORMAT: &[u8] = b"d\0";
const ITEM_SIZE: ffi::Py_ssize_t = std::mem::size_of::<f64>() as ffi::Py_ssize_t;

/// Buffer-protocol exporter over borrowed native `f64` memory.
#[pyclass(frozen, module = "mesh_coupling", name = "NativeBuffer")]
pub(crate) struct NativeBuffer {
    /// Address of the first value.
    addr: usize,
    len: ffi::Py_ssize_t,
    writable: bool,
    ndim: c_int,
    shape: [ffi::Py_ssize_t; 2],
    strides: [ffi::Py_ssize_t; 2],
    exports: AtomicUsize,
    revoked: AtomicBool,
}

#[pymethods]
impl NativeBuffer {
    unsafe fn __getbuffer__(
        slf: Bound<'_, Self>,
        view: *mut ffi::Py_buffer,
        flags: c_int,
    ) -> PyResult<()> {
        let this = slf.get();
        if view.is_null() {
            return Err(PyBufferError::new_err("view is null"));
        }
        if this.revoked.load(Ordering::Acquire) {
            return Err(PyBufferError::new_err(
                "native buffer is only valid during the action call",
            ));
        }
        if flags & ffi::PyBUF_WRITABLE == ffi::PyBUF_WRITABLE && !this.writable {
            return Err(PyBufferError::new_err("source data is read-only"));
        }
        if flags & ffi::PyBUF_F_CONTIGUOUS == ffi::PyBUF_F_CONTIGUOUS
            && this.ndim == 2
            && this.shape[0] > 1
            && this.shape[1] > 1
        {
            return Err(PyBufferError::new_err("native buffer is row-major"));
        }
        let shaped = flags & ffi::PyBUF_ND == ffi::PyBUF_ND;
        let strided = flags & ffi::PyBUF_STRIDES == ffi::PyBUF_STRIDES;
        // SAFETY: `view` is non-null and points to a Py_buffer owned by the
        // caller. Shape and strides live inside this object, which `obj`
        // keeps alive until the buffer is released.
        unsafe {
            (*view).buf = this.addr as *mut c_void;
            (*view).len = this.len;
            (*view).readonly = c_int::from(!this.writable);
            (*view).itemsize = ITEM_SIZE;
            (*view).format = if flags & ffi::PyBUF_FORMAT == ffi::PyBUF_FORMAT {
                FORMAT.as_ptr() as *mut c_char
            } else {
                ptr::null_mut()
            };
            (*view).ndim = if shaped { this.ndim } else { 1 };
            (*view).shape = if shaped {
                this.shape.as_ptr() as *mut ffi::Py_ssize_t
            } else {
                ptr::null_mut()
            };
            (*view).strides = if strided {
                this.strides.as_ptr() as *mut ffi::Py_ssize_t
            } else {
                ptr::null_mut()
            };
            (*view).suboffsets = ptr::null_mut();
            (*view).internal = ptr::null_mut();
            (*view).obj = slf.clone().into_any().into_ptr();
        }
        this.exports.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    unsafe fn __releasebuffer__(&self, _view: *mut ffi::Py_buffer) {
        self.exports.fetch_sub(1, Ordering::AcqRel);
    }

    /// Number of buffer exports currently open.
    #[getter]
    fn exports(&self) -> usize {
        self.exports.load(Ordering::Acquire)
    }
}

impl NativeBuffer {
    fn new(addr: usize, bytes: usize, dims: usize, writable: bool) -> Self {
        let rows = bytes / ITEM_SIZE as usize / dims;
        let (ndim, shape, strides) = if dims == 1 {
            (1, [rows as ffi::Py_ssize_t, 0], [ITEM_SIZE, 0])
        } else {
            (
                2,
                [rows as ffi::Py_ssize_t, dims as ffi::Py_ssize_t],
                [dims as ffi::Py_ssize_t * ITEM_SIZE, ITEM_SIZE],
            )
        };
        NativeBuffer {
            addr,
            len: bytes as ffi::Py_ssize_t,
            writable,
            ndim,
            shape,
            strides,
            exports: AtomicUsize::new(0),
            revoked: AtomicBool::new(false),
        }
    }

    /// Refuses further exports and returns how many are still open.
    fn revoke(&self) -> usize {
        self.revoked.store(true, Ordering::Release);
        self.exports.load(Ordering::Acquire)
    }
}

/// Why a view could not be finished cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FinishError {
    /// Python still holds this many exports of the native memory.
    Retained(usize),
    /// The copied list could not be written back.
    CopyBack(String),
}

impl FinishError {
    pub(crate) fn is_retained(&self) -> bool {
        matches!(self, FinishError::Retained(_))
    }
}

impl fmt::Display for FinishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishError::Retained(n) => write!(
                f,
                "the module kept {n} reference(s) to the array after the call"
            ),
            FinishError::CopyBack(reason) => f.write_str(reason),
        }
    }
}

enum ViewKind<'py, 'buf> {
    Aliased {
        exporter: Bound<'py, NativeBuffer>,
        /// Object handed to Python: a memoryview or a numpy array.
        array: Bound<'py, PyAny>,
        _buf: PhantomData<&'buf mut [f64]>,
    },
    Copied {
        list: Bound<'py, PyList>,
        writeback: Option<&'buf mut [f64]>,
        dims: usize,
    },
    Released,
}

/// One native buffer as seen from Python, for the duration of one call.
pub(crate) struct ArrayView<'py, 'buf> {
    kind: ViewKind<'py, 'buf>,
}

impl<'py, 'buf> ArrayView<'py, 'buf> {
    /// Read-only view of `values`, `dims` components per vertex.
    pub(crate) fn read_only(
        py: Python<'py>,
        values: &'buf [f64],
        dims: usize,
        numpy: Option<&Bound<'py, PyModule>>,
    ) -> Result<Self, String> {
        if values.is_empty() {
            return Ok(ArrayView {
                kind: ViewKind::Copied {
                    list: copy_in(py, values, dims),
                    writeback: None,
                    dims,
                },
            });
        }
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let exporter = NativeBuffer::new(bytes.as_ptr() as usize, bytes.len(), dims, false);
        Self::aliased(py, exporter, numpy)
    }

    /// Writable view of `values`, `dims` components per vertex.
    pub(crate) fn writable(
        py: Python<'py>,
        values: &'buf mut [f64],
        dims: usize,
        numpy: Option<&Bound<'py, PyModule>>,
    ) -> Result<Self, String> {
        if values.is_empty() {
            return Ok(ArrayView {
                kind: ViewKind::Copied {
                    list: copy_in(py, values, dims),
                    writeback: Some(values),
                    dims,
                },
            });
        }
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(values);
        let exporter = NativeBuffer::new(bytes.as_mut_ptr() as usize, bytes.len(), dims, true);
        Self::aliased(py, exporter, numpy)
    }

    fn aliased(
        py: Python<'py>,
        exporter: NativeBuffer,
        numpy: Option<&Bound<'py, PyModule>>,
    ) -> Result<Self, String> {
        let exporter = Bound::new(py, exporter)
            .map_err(|e| format!("cannot export the buffer ({e})"))?;
        let array = match numpy {
            Some(np) => np.call_method1("asarray", (exporter.clone(),)),
            None => PyMemoryView::from_bound(exporter.as_any()).map(Bound::into_any),
        };
        let array = match array {
            Ok(array) => array,
            Err(e) => {
                exporter.get().revoke();
                return Err(format!("cannot wrap the buffer ({e})"));
            }
        };
        Ok(ArrayView {
            kind: ViewKind::Aliased {
                exporter,
                array,
                _buf: PhantomData,
            },
        })
    }

    /// True when Python sees the native memory rather than a copy.
    pub(crate) fn is_aliased(&self) -> bool {
        matches!(self.kind, ViewKind::Aliased { .. })
    }

    /// The object passed to Python.
    pub(crate) fn object(&self) -> Bound<'py, PyAny> {
        match &self.kind {
            ViewKind::Aliased { array, .. } => array.clone(),
            ViewKind::Copied { list, .. } => list.clone().into_any(),
            ViewKind::Released => unreachable!("view used after release"),
        }
    }

    /// Ends the call: revokes the exporter and checks that Python let go of
    /// the native memory, or copies list contents back into a writable
    /// buffer.
    pub(crate) fn finish(mut self) -> Result<(), FinishError> {
        match std::mem::replace(&mut self.kind, ViewKind::Released) {
            ViewKind::Aliased {
                exporter, array, ..
            } => {
                let py = exporter.py();
                drop(array);
                let mut open = exporter.get().revoke();
                if open > 0 {
                    // views caught in reference cycles are not retained
                    if let Err(e) = py.import_bound("gc").and_then(|gc| gc.call_method0("collect")) {
                        log::warn!("garbage collection before release check failed: {}", e);
                    }
                    open = exporter.get().exports();
                }
                match open {
                    0 => Ok(()),
                    n => Err(FinishError::Retained(n)),
                }
            }
            ViewKind::Copied {
                list,
                writeback: Some(values),
                dims,
            } => copy_out(&list, values, dims).map_err(FinishError::CopyBack),
            ViewKind::Copied { writeback: None, .. } | ViewKind::Released => Ok(()),
        }
    }
}

impl Drop for ArrayView<'_, '_> {
    fn drop(&mut self) {
        if let ViewKind::Aliased {
            exporter, array, ..
        } = std::mem::replace(&mut self.kind, ViewKind::Released)
        {
            drop(array);
            if exporter.get().revoke() > 0 {
                log::error!("aliased buffer dropped while python still references it");
            }
        }
    }
}

fn copy_in<'py>(py: Python<'py>, values: &[f64], dims: usize) -> Bound<'py, PyList> {
    log::debug!(
        "copying {} values into python instead of aliasing them",
        values.len()
    );
    if dims == 1 {
        return PyList::new_bound(py, values.iter());
    }
    let rows = values.chunks(dims).map(|row| PyList::new_bound(py, row.iter()));
    PyList::new_bound(py, rows)
}

fn copy_out(list: &Bound<'_, PyList>, values: &mut [f64], dims: usize) -> Result<(), String> {
    let flat: Vec<f64> = if dims == 1 {
        list.extract()
            .map_err(|e| format!("target list no longer holds floats ({e})"))?
    } else {
        let rows: Vec<Vec<f64>> = list
            .extract()
            .map_err(|e| format!("target list no longer holds rows of floats ({e})"))?;
        if let Some(row) = rows.iter().find(|r| r.len() != dims) {
            return Err(format!(
                "target row has {} components, expected {}",
                row.len(),
                dims
            ));
        }
        rows.into_iter().flatten().collect()
    };
    if flat.len() != values.len() {
        return Err(format!(
            "target list holds {} values, expected {}",
            flat.len(),
            values.len()
        ));
    }
    values.copy_from_slice(&flat);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_runtime<F: FnOnce(Python<'_>)>(f: F) {
        let _guard = crate::action::python::runtime::acquire().unwrap();
        Python::with_gil(f);
    }

    fn memoryview<'py>(obj: &Bound<'py, PyAny>) -> Bound<'py, PyAny> {
        PyMemoryView::from_bound(obj).unwrap().into_any()
    }

    #[test]
    #[serial(python)]
    fn writable_view_aliases_native_memory() {
        with_runtime(|py| {
            let mut values = vec![0.0; 3];
            let view = ArrayView::writable(py, &mut values, 1, None).unwrap();
            assert!(view.is_aliased());
            let obj = view.object();
            obj.set_item(1, 7.5).unwrap();
            drop(obj);
            view.finish().unwrap();
            assert_eq!(values, vec![0.0, 7.5, 0.0]);
        });
    }

    #[test]
    #[serial(python)]
    fn vector_view_is_indexed_by_row_and_component() {
        with_runtime(|py| {
            let mut values = vec![0.0; 6];
            let view = ArrayView::writable(py, &mut values, 2, None).unwrap();
            let obj = view.object();
            assert_eq!(obj.getattr("shape").unwrap().extract::<(usize, usize)>().unwrap(), (3, 2));
            obj.set_item((2, 0), 4.0).unwrap();
            obj.set_item((0, 1), -1.0).unwrap();
            drop(obj);
            view.finish().unwrap();
            assert_eq!(values, vec![0.0, -1.0, 0.0, 0.0, 4.0, 0.0]);
        });
    }

    #[test]
    #[serial(python)]
    fn read_only_view_rejects_writes() {
        with_runtime(|py| {
            let values = vec![1.0, 2.0];
            let view = ArrayView::read_only(py, &values, 1, None).unwrap();
            let obj = view.object();
            assert!(obj.set_item(0, 3.0).is_err());
            assert_eq!(obj.get_item(1).unwrap().extract::<f64>().unwrap(), 2.0);
            drop(obj);
            view.finish().unwrap();
        });
    }

    #[test]
    #[serial(python)]
    fn empty_buffer_falls_back_to_copy() {
        with_runtime(|py| {
            let mut values: Vec<f64> = Vec::new();
            let view = ArrayView::writable(py, &mut values, 2, None).unwrap();
            assert!(!view.is_aliased());
            view.finish().unwrap();
        });
    }

    #[test]
    #[serial(python)]
    fn derived_view_kept_past_finish_is_reported() {
        with_runtime(|py| {
            let mut values = vec![1.0];
            let view = ArrayView::writable(py, &mut values, 1, None).unwrap();
            let kept = memoryview(&view.object());
            assert_eq!(view.finish(), Err(FinishError::Retained(1)));
            drop(kept);
        });
    }

    #[test]
    #[serial(python)]
    fn finished_exporter_refuses_new_views() {
        with_runtime(|py| {
            let mut values = vec![1.0, 2.0];
            let view = ArrayView::writable(py, &mut values, 1, None).unwrap();
            let ViewKind::Aliased { exporter, .. } = &view.kind else {
                panic!("expected an aliased view");
            };
            let exporter = exporter.clone();
            view.finish().unwrap();
            assert_eq!(exporter.get().exports(), 0);
            let err = PyMemoryView::from_bound(exporter.as_any()).unwrap_err();
            assert!(err.is_instance_of::<PyBufferError>(py));
        });
    }

    #[test]
    #[serial(python)]
    fn copy_out_checks_shape() {
        with_runtime(|py| {
            let list = PyList::new_bound(py, [1.0, 2.0]);
            let mut values = vec![0.0; 3];
            assert!(copy_out(&list, &mut values, 1).is_err());
            let mut values = vec![0.0; 2];
            copy_out(&list, &mut values, 1).unwrap();
            assert_eq!(values, vec![1.0, 2.0]);
        });
    }
}
