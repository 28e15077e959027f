//! Tesseract LSTM recognition backend via runtime library loading.
//!
//! Loads the Tesseract shared library with `libloading`, resolves the C API
//! symbols, and walks the result iterator at symbol or word level to produce
//! one `Detection` per glyph. One engine handle serves a whole batch; images
//! are recognized one at a time.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::path::Path;
use std::ptr;

use glyphcrop_core::{Detection, GlyphBox, GlyphError, GlyphLevel, GlyphRecognizer, RawImage, Result};

use crate::config::TesseractConfig;

/// `TessPageIteratorLevel` values.
const RIL_WORD: c_int = 3;
const RIL_SYMBOL: c_int = 4;

fn iterator_level(level: GlyphLevel) -> c_int {
    match level {
        GlyphLevel::Symbol => RIL_SYMBOL,
        GlyphLevel::Word => RIL_WORD,
    }
}

type Handle = *mut c_void;
type ResultIter = *mut c_void;
type PageIter = *mut c_void;

/// Loaded Tesseract C API function pointers.
struct TessApi {
    _lib: libloading::Library,
    create: unsafe extern "C" fn() -> Handle,
    init3: unsafe extern "C" fn(Handle, *const c_char, *const c_char) -> c_int,
    set_variable: unsafe extern "C" fn(Handle, *const c_char, *const c_char) -> c_int,
    set_page_seg_mode: unsafe extern "C" fn(Handle, c_int),
    set_image: unsafe extern "C" fn(Handle, *const u8, c_int, c_int, c_int, c_int),
    recognize: unsafe extern "C" fn(Handle, *mut c_void) -> c_int,
    get_iterator: unsafe extern "C" fn(Handle) -> ResultIter,
    iter_page_iterator: unsafe extern "C" fn(ResultIter) -> PageIter,
    iter_bounding_box:
        unsafe extern "C" fn(PageIter, c_int, *mut c_int, *mut c_int, *mut c_int, *mut c_int) -> c_int,
    iter_utf8_text: unsafe extern "C" fn(ResultIter, c_int) -> *mut c_char,
    iter_confidence: unsafe extern "C" fn(ResultIter, c_int) -> f32,
    iter_next: unsafe extern "C" fn(ResultIter, c_int) -> c_int,
    iter_delete: unsafe extern "C" fn(ResultIter),
    clear: unsafe extern "C" fn(Handle),
    end: unsafe extern "C" fn(Handle),
    delete: unsafe extern "C" fn(Handle),
    delete_text: unsafe extern "C" fn(*mut c_char),
}

/// Resolve one symbol, copying the function pointer out of the library.
///
/// Safety: `T` must match the C signature of `name`.
unsafe fn symbol<T: Copy>(lib: &libloading::Library, name: &str) -> Result<T> {
    let mut bytes = name.as_bytes().to_vec();
    bytes.push(0);
    lib.get::<T>(&bytes)
        .map(|s| *s)
        .map_err(|e| GlyphError::EngineUnavailable(format!("{name}: {e}")))
}

impl TessApi {
    /// Load the Tesseract library and resolve all required C API symbols.
    fn load(library_path: &Path) -> Result<Self> {
        // Safety: loading a dynamic library runs its initializers. We trust
        // that the configured path points to a Tesseract build.
        let lib = unsafe { libloading::Library::new(library_path) }.map_err(|e| {
            GlyphError::EngineUnavailable(format!(
                "failed to load Tesseract library '{}': {}",
                library_path.display(),
                e
            ))
        })?;

        // Safety: each type below mirrors the Tesseract 4/5 C API (capi.h).
        unsafe {
            Ok(Self {
                create: symbol(&lib, "TessBaseAPICreate")?,
                init3: symbol(&lib, "TessBaseAPIInit3")?,
                set_variable: symbol(&lib, "TessBaseAPISetVariable")?,
                set_page_seg_mode: symbol(&lib, "TessBaseAPISetPageSegMode")?,
                set_image: symbol(&lib, "TessBaseAPISetImage")?,
                recognize: symbol(&lib, "TessBaseAPIRecognize")?,
                get_iterator: symbol(&lib, "TessBaseAPIGetIterator")?,
                iter_page_iterator: symbol(&lib, "TessResultIteratorGetPageIterator")?,
                iter_bounding_box: symbol(&lib, "TessPageIteratorBoundingBox")?,
                iter_utf8_text: symbol(&lib, "TessResultIteratorGetUTF8Text")?,
                iter_confidence: symbol(&lib, "TessResultIteratorConfidence")?,
                iter_next: symbol(&lib, "TessResultIteratorNext")?,
                iter_delete: symbol(&lib, "TessResultIteratorDelete")?,
                clear: symbol(&lib, "TessBaseAPIClear")?,
                end: symbol(&lib, "TessBaseAPIEnd")?,
                delete: symbol(&lib, "TessBaseAPIDelete")?,
                delete_text: symbol(&lib, "TessDeleteText")?,
                _lib: lib,
            })
        }
    }
}

/// Deletes a result iterator when dropped.
struct IterGuard<'a> {
    api: &'a TessApi,
    iter: ResultIter,
}

impl Drop for IterGuard<'_> {
    fn drop(&mut self) {
        // Safety: `iter` came from TessBaseAPIGetIterator and is deleted once.
        unsafe { (self.api.iter_delete)(self.iter) };
    }
}

/// Tesseract-backed [`GlyphRecognizer`].
///
/// Holds a single `TessBaseAPI` handle. The raw handle makes this type
/// `!Send`: build it on the thread that runs the batch.
pub struct TesseractRecognizer {
    api: TessApi,
    handle: Handle,
    page_seg_mode: c_int,
}

impl TesseractRecognizer {
    /// Load the library, create and initialize an engine, apply options.
    ///
    /// Every failure maps to `GlyphError::EngineUnavailable`.
    pub fn new(config: &TesseractConfig) -> Result<Self> {
        let api = TessApi::load(Path::new(&config.library_path))?;

        let language = CString::new(config.language.as_str())
            .map_err(|e| GlyphError::EngineUnavailable(format!("invalid language name: {e}")))?;
        let tessdata = config
            .tessdata_path
            .as_deref()
            .map(CString::new)
            .transpose()
            .map_err(|e| GlyphError::EngineUnavailable(format!("invalid tessdata path: {e}")))?;

        // Safety: create has no preconditions.
        let handle = unsafe { (api.create)() };
        if handle.is_null() {
            return Err(GlyphError::EngineUnavailable(
                "TessBaseAPICreate returned null".into(),
            ));
        }

        let datapath = tessdata.as_ref().map_or(ptr::null(), |s| s.as_ptr());
        // Safety: handle is live, strings are NUL-terminated and outlive the call.
        let rc = unsafe { (api.init3)(handle, datapath, language.as_ptr()) };
        if rc != 0 {
            unsafe { (api.delete)(handle) };
            return Err(GlyphError::EngineUnavailable(format!(
                "TessBaseAPIInit3 failed (rc={}), tessdata={:?} lang={:?}",
                rc, config.tessdata_path, config.language,
            )));
        }

        let mut recognizer = Self {
            api,
            handle,
            page_seg_mode: config.page_seg_mode.as_raw(),
        };

        for (name, value) in config.variables() {
            recognizer.set_variable(name, &value)?;
        }

        tracing::info!(
            library = %config.library_path,
            tessdata = ?config.tessdata_path,
            lang = %config.language,
            psm = recognizer.page_seg_mode,
            "Tesseract recognizer initialized"
        );

        Ok(recognizer)
    }

    fn set_variable(&mut self, name: &str, value: &str) -> Result<()> {
        let to_c = |s: &str| {
            CString::new(s).map_err(|e| {
                GlyphError::EngineUnavailable(format!("invalid value for {name}: {e}"))
            })
        };
        let (c_name, c_value) = (to_c(name)?, to_c(value)?);
        // Safety: handle is live, both strings are NUL-terminated.
        let ok = unsafe { (self.api.set_variable)(self.handle, c_name.as_ptr(), c_value.as_ptr()) };
        if ok == 0 {
            tracing::warn!(variable = name, value, "Tesseract rejected variable");
        }
        Ok(())
    }

    fn recognition_error(message: impl Into<String>) -> GlyphError {
        GlyphError::Recognition {
            source_image: String::new(),
            message: message.into(),
        }
    }

    /// Walk the result iterator of the last `Recognize` call.
    ///
    /// Safety: `self.handle` must be live and have just run `Recognize`.
    unsafe fn collect_detections(&self, level: c_int) -> Vec<Detection> {
        let iter = (self.api.get_iterator)(self.handle);
        if iter.is_null() {
            return Vec::new();
        }
        let guard = IterGuard {
            api: &self.api,
            iter,
        };

        let mut detections = Vec::new();
        loop {
            let page_iter = (self.api.iter_page_iterator)(guard.iter);
            let (mut left, mut top, mut right, mut bottom) = (0, 0, 0, 0);
            let has_box = (self.api.iter_bounding_box)(
                page_iter, level, &mut left, &mut top, &mut right, &mut bottom,
            ) != 0;

            let text_ptr = (self.api.iter_utf8_text)(guard.iter, level);
            let text = if text_ptr.is_null() {
                String::new()
            } else {
                let s = CStr::from_ptr(text_ptr).to_string_lossy().into_owned();
                (self.api.delete_text)(text_ptr);
                s
            };

            if has_box {
                let confidence = (self.api.iter_confidence)(guard.iter, level);
                detections.push(Detection::new(
                    text,
                    confidence,
                    GlyphBox::new(left, top, right, bottom),
                ));
            }

            if (self.api.iter_next)(guard.iter, level) == 0 {
                break;
            }
        }
        detections
    }
}

impl GlyphRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&mut self, image: &RawImage, level: GlyphLevel) -> Result<Vec<Detection>> {
        if self.handle.is_null() {
            return Err(Self::recognition_error("engine already released"));
        }
        if !matches!(image.channels, 1 | 3 | 4) {
            return Err(Self::recognition_error(format!(
                "unsupported channel count {}",
                image.channels
            )));
        }
        let expected = image.width as usize * image.height as usize * image.channels as usize;
        if image.data.len() != expected {
            return Err(Self::recognition_error(format!(
                "pixel buffer has {} bytes, expected {expected}",
                image.data.len()
            )));
        }
        let to_int = |v: u64| {
            c_int::try_from(v).map_err(|_| Self::recognition_error("image too large for Tesseract"))
        };
        let width = to_int(image.width as u64)?;
        let height = to_int(image.height as u64)?;
        let bpp = image.channels as c_int;
        let stride = to_int(image.width as u64 * image.channels as u64)?;

        // Safety: handle is live; the pixel buffer is exactly
        // height * stride bytes and outlives the Recognize call.
        let detections = unsafe {
            (self.api.set_page_seg_mode)(self.handle, self.page_seg_mode);
            (self.api.set_image)(self.handle, image.data.as_ptr(), width, height, bpp, stride);
            let rc = (self.api.recognize)(self.handle, ptr::null_mut());
            if rc != 0 {
                (self.api.clear)(self.handle);
                return Err(Self::recognition_error(format!(
                    "TessBaseAPIRecognize failed (rc={rc})"
                )));
            }
            let detections = self.collect_detections(iterator_level(level));
            (self.api.clear)(self.handle);
            detections
        };

        tracing::debug!(
            width = image.width,
            height = image.height,
            level = %level,
            detections = detections.len(),
            "Tesseract recognition complete"
        );
        Ok(detections)
    }

    fn release(&mut self) -> Result<()> {
        if self.handle.is_null() {
            return Ok(());
        }
        // Safety: handle is live and nulled right after, so this runs once.
        unsafe {
            (self.api.end)(self.handle);
            (self.api.delete)(self.handle);
        }
        self.handle = ptr::null_mut();
        tracing::debug!("Tesseract engine released");
        Ok(())
    }
}

impl Drop for TesseractRecognizer {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
