use std::{fmt::Write as _, io::Write, path::Path};

use crate::{
    inputs::WIDTH1,
    network::{Network, NetworkVariant},
    util::f32s_to_le_bytes,
    Error, Result,
};

/// Blob length in bytes, from shape constants alone.
pub fn expected_blob_size<V: NetworkVariant>() -> u64 {
    let embedding = (WIDTH1 + 1) * V::WIDTH2;
    let dense: usize = V::EXPORT_LAYERS
        .iter()
        .filter_map(|id| V::LAYERS.iter().find(|l| l.id == *id))
        .map(|l| l.size())
        .sum();

    (4 * (embedding + dense)) as u64
}

/// Flattens a network into the layout the inference engine reads:
/// embedding rows `[0, WIDTH1)`, the legacy `l1.bias`, then the weight
/// (`[out][in]`) and bias of each export layer, all little-endian `f32`.
pub fn serialise<V: NetworkVariant>(network: &Network<V>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(expected_blob_size::<V>() as usize);

    let embedding = network.embedding();
    f32s_to_le_bytes(&embedding.weights()[..WIDTH1 * embedding.width()], &mut buf);
    f32s_to_le_bytes(network.l1_bias(), &mut buf);

    for id in V::EXPORT_LAYERS {
        if let Some(layer) = network.layer(id) {
            f32s_to_le_bytes(layer.weights(), &mut buf);
            f32s_to_le_bytes(layer.biases(), &mut buf);
        }
    }

    buf
}

/// Writes `bytes` to `path` through a temporary file in the same directory,
/// moving it into place only if its size is `expected`.
fn write_verified(bytes: &[u8], path: &Path, expected: u64) -> Result<u64> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new().prefix(".export-").tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    let actual = tmp.as_file().metadata()?.len();
    if actual != expected {
        return Err(Error::SizeVerification { path: path.to_path_buf(), expected, actual });
    }

    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(actual)
}

/// Exports `network` to `path`, replacing any previous blob. Returns the
/// number of bytes written.
pub fn write_weight_blob<V: NetworkVariant>(network: &Network<V>, path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    let size = write_verified(&serialise(network), path, expected_blob_size::<V>())?;

    log::info!("exported {} network to [{}] ({size} bytes)", V::NAME, path.display());
    Ok(size)
}

/// Renders `bytes` as a C++ source fragment defining `<symbol>` and
/// `<symbol>Size` in `namespace nn`, for linking weights into the engine.
pub fn embedded_source(bytes: &[u8], symbol: &str) -> String {
    let mut out = String::with_capacity(4 * bytes.len() + 256);

    let _ = writeln!(out, "namespace nn {{");
    let _ = writeln!(out, "  extern const char* {symbol};");
    let _ = writeln!(out, "  extern const size_t {symbol}Size;");

    out.push_str("  const char* ");
    out.push_str(symbol);
    out.push_str(" = \"");
    for byte in bytes {
        let _ = write!(out, "\\x{byte:02x}");
    }
    out.push_str("\";\n");

    let _ = writeln!(out, "  const size_t {symbol}Size = {};", bytes.len());
    out.push_str("}\n");

    out
}
