use anyhow::{bail, Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;

use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        ResourceId(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone)]
pub struct AudioData {
    pub samples: Vec<f32>, // Interleaved samples
    pub sample_rate: u32,
    pub channels: u16,
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl AudioData {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// A decoded, seekable audio source. Immutable once loaded; every load gets a new id.
#[derive(Clone)]
pub struct AudioResource {
    id: ResourceId,
    name: String,
    duration_secs: f64,
    data: Arc<AudioData>,
}

impl AudioResource {
    pub fn new(name: impl Into<String>, data: AudioData) -> Result<Self> {
        let duration_secs = data.duration_secs();
        if data.frames() == 0 || duration_secs <= 0.0 {
            bail!("no audio frames decoded");
        }
        Ok(Self {
            id: ResourceId::next(),
            name: name.into(),
            duration_secs,
            data: Arc::new(data),
        })
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn data(&self) -> &Arc<AudioData> {
        &self.data
    }
}

impl std::fmt::Debug for AudioResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioResource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("duration_secs", &self.duration_secs)
            .finish()
    }
}

fn decode_source(source: Box<dyn MediaSource>, hint: &Hint) -> Result<AudioData> {
    let mss = MediaSourceStream::new(source, Default::default());

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let mut probed = symphonia::default::get_probe()
        .format(hint, mss, &fmt_opts, &meta_opts)
        .context("unsupported format")?;

    let mut title = None;
    let mut artist = None;
    if let Some(metadata) = probed.format.metadata().current() {
        for tag in metadata.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => title = Some(tag.value.to_string()),
                Some(StandardTagKey::Artist) => artist = Some(tag.value.to_string()),
                _ => (),
            }
        }
    }

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("no supported audio track")?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .context("unsupported codec")?;

    let track_id = track.id;
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = 0;
    let mut channels = 0;
    let mut scratch: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream surfaces as an io error
            Err(Error::IoError(_)) => break,
            Err(Error::ResetRequired) => break,
            Err(e) => {
                log::warn!("stopping decode early: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if sample_rate == 0 {
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;
                }

                let needed = decoded.capacity() * spec.channels.count();
                if scratch.as_ref().map_or(true, |b| b.capacity() < needed) {
                    scratch = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = scratch.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            Err(Error::DecodeError(e)) => log::debug!("skipping undecodable packet: {}", e),
            Err(e) => return Err(e).context("decoder failed"),
        }
    }

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
        title,
        artist,
    })
}

pub fn load_resource<P: AsRef<Path>>(path: P) -> Result<AudioResource> {
    let path = path.as_ref();
    let src = File::open(path)
        .with_context(|| format!("failed to open audio file {}", path.display()))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let data = decode_source(Box::new(src), &hint)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let resource = AudioResource::new(name, data)?;
    log::info!(
        "decoded {} ({:.2}s, {} Hz, {} ch)",
        resource.name(),
        resource.duration_secs(),
        resource.data().sample_rate,
        resource.data().channels
    );
    Ok(resource)
}

pub fn load_resource_from_bytes(
    name: &str,
    data: Vec<u8>,
    extension_hint: Option<&str>,
) -> Result<AudioResource> {
    let src = Cursor::new(data);

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    let data = decode_source(Box::new(src), &hint)?;
    AudioResource::new(name, data)
}
