//! Deduplicating, batched texture loading
//!
//! Importers call [`TextureLoader::request_load`] while walking a scene and
//! get a [`TextureHandle`] back immediately. Identical requests share one
//! handle. [`TextureLoader::flush_pending`] then reads every file, decodes
//! all of them in parallel and uploads the results on the calling thread,
//! filling the handles in place.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vista_render::{GpuBackend, TextureHandle};

use crate::error::TextureError;
use crate::texture::{decode_texture, DecodedTexture};

/// Where the encoded bytes of a texture come from.
#[derive(Debug, Clone)]
pub enum TextureSource {
    /// Read from `path` during the flush
    File,
    /// Already in memory, `path` is only a label
    Embedded(Arc<[u8]>),
}

/// What a caller asks for.
#[derive(Debug, Clone)]
pub struct TextureRequestDesc {
    pub path: PathBuf,
    pub source: TextureSource,
    pub srgb: bool,
    pub flip_vertically: bool,
    pub bindless: bool,
}

impl TextureRequestDesc {
    pub fn file(path: impl Into<PathBuf>, srgb: bool) -> Self {
        Self {
            path: path.into(),
            source: TextureSource::File,
            srgb,
            flip_vertically: false,
            bindless: false,
        }
    }

    pub fn embedded(label: impl Into<PathBuf>, data: Arc<[u8]>, srgb: bool) -> Self {
        Self {
            source: TextureSource::Embedded(data),
            ..Self::file(label, srgb)
        }
    }

    pub fn flipped(mut self) -> Self {
        self.flip_vertically = true;
        self
    }

    pub fn bindless(mut self) -> Self {
        self.bindless = true;
        self
    }
}

/// Identity of a request. Embedded data is identified by the address and
/// length of its buffer, not its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureKey {
    path: PathBuf,
    data: Option<(usize, usize)>,
    srgb: bool,
    flip_vertically: bool,
    bindless: bool,
}

impl TextureKey {
    pub fn of(desc: &TextureRequestDesc) -> Self {
        Self {
            path: desc.path.clone(),
            data: match &desc.source {
                TextureSource::File => None,
                TextureSource::Embedded(d) => Some((Arc::as_ptr(d) as *const u8 as usize, d.len())),
            },
            srgb: desc.srgb,
            flip_vertically: desc.flip_vertically,
            bindless: desc.bindless,
        }
    }
}

/// A pending request, owned by the loader until the next flush.
#[derive(Debug)]
struct TextureRequest {
    key: TextureKey,
    desc: TextureRequestDesc,
    /// Index of the handle this request fills
    slot: usize,
}

impl TextureRequest {
    /// The loader reads the file itself when the caller gave no bytes.
    fn owns_data(&self) -> bool {
        matches!(self.desc.source, TextureSource::File)
    }
}

/// Loader tuning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureLoaderConfig {
    /// Decode worker count. 0 uses rayon's global pool.
    pub decode_threads: usize,
}

/// Outcome of one [`TextureLoader::flush_pending`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub requested: usize,
    pub read_failures: usize,
    pub decode_failures: usize,
    pub uploaded: usize,
}

impl FlushReport {
    pub fn failures(&self) -> usize {
        self.read_failures + self.decode_failures
    }
}

/// Per-request scratch state for a flush
struct DecodeJob<'a> {
    request: &'a TextureRequest,
    bytes: Option<Cow<'a, [u8]>>,
    result: Option<Result<DecodedTexture, TextureError>>,
}

pub struct TextureLoader {
    requests: Vec<TextureRequest>,
    handles: Vec<TextureHandle>,
    pool: Option<rayon::ThreadPool>,
    /// Requests answered from an existing entry since creation
    reused: usize,
}

impl Default for TextureLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureLoader {
    /// Loader that decodes on rayon's global pool.
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            handles: Vec::new(),
            pool: None,
            reused: 0,
        }
    }

    /// Loader with a dedicated decode pool when `decode_threads` is set.
    /// Falls back to the global pool if the pool cannot be built.
    pub fn with_config(config: &TextureLoaderConfig) -> Self {
        let mut loader = Self::new();
        if config.decode_threads > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.decode_threads)
                .thread_name(|i| format!("texture-decode-{i}"))
                .build()
            {
                Ok(pool) => loader.pool = Some(pool),
                Err(e) => warn!("Failed to build texture decode pool, using the global pool: {}", e),
            }
        }
        loader
    }

    /// Register a texture to load and return its handle.
    ///
    /// A request identical to one already pending gets the existing handle
    /// and adds no work. The handle stays empty until the next flush.
    pub fn request_load(&mut self, desc: TextureRequestDesc) -> TextureHandle {
        let key = TextureKey::of(&desc);
        if let Some(existing) = self.requests.iter().find(|r| r.key == key) {
            debug!("Re-using texture '{}'", existing.desc.path.display());
            self.reused += 1;
            return self.handles[existing.slot].clone();
        }

        let slot = self.handles.len();
        let handle = TextureHandle::empty();
        self.handles.push(handle.clone());
        self.requests.push(TextureRequest { key, desc, slot });
        handle
    }

    /// Number of distinct requests waiting for a flush.
    pub fn pending_len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_idle(&self) -> bool {
        self.requests.is_empty()
    }

    /// Requests that were answered with an already pending handle.
    pub fn reused_requests(&self) -> usize {
        self.reused
    }

    /// Read, decode and upload every pending request.
    ///
    /// Reading happens sequentially, decoding in parallel and uploading on
    /// the calling thread, which must own the graphics context. Failed
    /// requests are logged and leave their handle empty. The pending set is
    /// cleared afterwards, so a second call with nothing new does nothing.
    pub fn flush_pending(&mut self, backend: &mut dyn GpuBackend) -> FlushReport {
        let mut report = FlushReport {
            requested: self.requests.len(),
            ..FlushReport::default()
        };
        if self.requests.is_empty() {
            return report;
        }

        let files = self.requests.iter().filter(|r| r.owns_data()).count();
        debug!(
            "Flushing {} textures ({} from disk, {} embedded)",
            self.requests.len(),
            files,
            self.requests.len() - files
        );

        // Phase 1: read
        let mut jobs: Vec<DecodeJob<'_>> = self
            .requests
            .iter()
            .map(|request| {
                let bytes = match &request.desc.source {
                    TextureSource::Embedded(data) => Some(Cow::Borrowed(&data[..])),
                    TextureSource::File => match std::fs::read(&request.desc.path) {
                        Ok(bytes) => Some(Cow::Owned(bytes)),
                        Err(e) => {
                            warn!("{}", TextureError::Read(request.desc.path.clone(), e));
                            report.read_failures += 1;
                            None
                        }
                    },
                };
                DecodeJob {
                    request,
                    bytes,
                    result: None,
                }
            })
            .collect();

        // Phase 2: decode
        let decode = |job: &mut DecodeJob<'_>| {
            if let Some(bytes) = job.bytes.take() {
                let desc = &job.request.desc;
                job.result = Some(decode_texture(&desc.path, &bytes, desc.flip_vertically));
            }
        };
        match &self.pool {
            Some(pool) => pool.install(|| jobs.par_iter_mut().for_each(decode)),
            None => jobs.par_iter_mut().for_each(decode),
        }

        // Phase 3: upload
        for job in jobs {
            let desc = &job.request.desc;
            match job.result {
                Some(Ok(decoded)) => {
                    let texture = backend.create_texture(&decoded.upload(desc.srgb, desc.bindless));
                    debug!(
                        "Uploaded texture '{}' as {} ({}x{})",
                        desc.path.display(),
                        texture.id,
                        texture.width,
                        texture.height
                    );
                    self.handles[job.request.slot].fill(texture);
                    report.uploaded += 1;
                }
                Some(Err(e)) => {
                    warn!("{}", e);
                    report.decode_failures += 1;
                }
                None => {}
            }
        }

        info!(
            "Texture flush: {} requested, {} uploaded, {} failed",
            report.requested,
            report.uploaded,
            report.failures()
        );

        self.requests.clear();
        self.handles.clear();
        report
    }
}
