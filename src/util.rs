use std::{fs::File, io};

use crate::{Error, Result};

pub fn sigmoid(x: f32) -> f32 {
    1. / (1. + (-x).exp())
}

/// Reads exactly `buf.len()` bytes at `offset` without touching any shared cursor.
#[cfg(unix)]
pub fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

/// Reads exactly `buf.len()` bytes at `offset` without touching any shared cursor.
#[cfg(windows)]
pub fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "failed to fill whole buffer")),
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

pub fn f32s_to_le_bytes(values: &[f32], out: &mut Vec<u8>) {
    out.reserve(values.len() * 4);
    for val in values {
        out.extend_from_slice(&val.to_le_bytes());
    }
}

/// Writes a labelled tensor: the id, a newline, the element count as a
/// little-endian `u64`, then the values as little-endian `f32`s.
pub fn write_labelled_tensor(buf: &mut Vec<u8>, id: &str, values: &[f32]) {
    assert!(!id.contains('\n'), "Tensor ids cannot contain newlines!");

    buf.extend_from_slice(id.as_bytes());
    buf.push(b'\n');
    buf.extend_from_slice(&(values.len() as u64).to_le_bytes());
    f32s_to_le_bytes(values, buf);
}

/// Reads back every tensor written by [`write_labelled_tensor`], in file order.
pub fn read_labelled_tensors(bytes: &[u8]) -> Result<Vec<(String, Vec<f32>)>> {
    const LEN: usize = std::mem::size_of::<u64>();

    let corrupt = |msg: &str| Error::CheckpointFormat(msg.to_string());

    let mut res = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        let newline = rest.iter().position(|&ch| ch == b'\n').ok_or_else(|| corrupt("unterminated tensor id"))?;
        let id = std::str::from_utf8(&rest[..newline]).map_err(|_| corrupt("tensor id is not utf-8"))?.to_string();
        offset += newline + 1;

        let len_bytes = bytes.get(offset..offset + LEN).ok_or_else(|| corrupt("truncated tensor header"))?;
        let mut single_size = [0u8; LEN];
        single_size.copy_from_slice(len_bytes);
        let single_size = usize::try_from(u64::from_le_bytes(single_size)).map_err(|_| corrupt("tensor too large"))?;
        offset += LEN;

        let end = single_size.checked_mul(4).and_then(|n| n.checked_add(offset));
        let data = end.and_then(|end| bytes.get(offset..end)).ok_or_else(|| corrupt("truncated tensor data"))?;

        let values = data.chunks_exact(4).map(|w| f32::from_le_bytes([w[0], w[1], w[2], w[3]])).collect();
        offset += data.len();

        res.push((id, values));
    }

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_tensors() {
        let mut buf = Vec::new();
        write_labelled_tensor(&mut buf, "l2.weight", &[1.0, -0.5, f32::MIN_POSITIVE]);
        write_labelled_tensor(&mut buf, "empty", &[]);
        write_labelled_tensor(&mut buf, "l2.bias", &[3.25]);

        let tensors = read_labelled_tensors(&buf).unwrap();
        assert_eq!(tensors.len(), 3);
        assert_eq!(tensors[0], ("l2.weight".to_string(), vec![1.0, -0.5, f32::MIN_POSITIVE]));
        assert_eq!(tensors[1], ("empty".to_string(), vec![]));
        assert_eq!(tensors[2], ("l2.bias".to_string(), vec![3.25]));
    }

    #[test]
    fn truncated_tensor() {
        let mut buf = Vec::new();
        write_labelled_tensor(&mut buf, "x", &[1.0, 2.0]);
        buf.pop();

        assert!(matches!(read_labelled_tensors(&buf), Err(Error::CheckpointFormat(_))));
    }

    #[test]
    fn positional_reads() {
        use std::io::Write;

        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&(0u8..32).collect::<Vec<_>>()).unwrap();

        let mut buf = [0; 4];
        read_exact_at(&file, &mut buf, 10).unwrap();
        assert_eq!(buf, [10, 11, 12, 13]);

        read_exact_at(&file, &mut buf, 0).unwrap();
        assert_eq!(buf, [0, 1, 2, 3]);

        assert!(read_exact_at(&file, &mut buf, 30).is_err());
    }
}
