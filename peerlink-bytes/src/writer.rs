//! Internal: declare the Writer trait.

use crate::Writeable;

/// A byte-oriented trait for building small messages.
///
/// Unlike `std::io::Write`, this trait's methods are not allowed to
/// fail.  It's not for I/O.
///
/// Most code will want to use the fact that `Vec<u8>` implements this
/// trait.  To define a new implementation, just define the `write_all`
/// method.
///
/// # Examples
///
/// You can use a Writer to add bytes explicitly:
/// ```
/// use peerlink_bytes::Writer;
/// let mut w: Vec<u8> = Vec::new(); // Vec<u8> implements Writer.
/// w.write_u8(0x05);
/// w.write_u8(0x01);
/// w.write_u16(443);
/// assert_eq!(w, &[0x05, 0x01, 0x01, 0xbb]);
/// ```
///
/// You can also use a Writer to encode things that implement the
/// [`Writeable`](crate::Writeable) trait:
///
/// ```
/// use peerlink_bytes::Writer;
/// let mut w: Vec<u8> = Vec::new();
/// w.write_u8(4);
/// w.write(&b"host"[..]);
/// assert_eq!(w, b"\x04host");
/// ```
pub trait Writer {
    /// Append a slice to the end of this writer.
    fn write_all(&mut self, b: &[u8]);

    /// Append a single u8 to this writer.
    fn write_u8(&mut self, x: u8) {
        self.write_all(&[x])
    }
    /// Append a single u16 to this writer, encoded in big-endian order.
    fn write_u16(&mut self, x: u16) {
        self.write_all(&x.to_be_bytes())
    }
    /// Encode a Writeable object onto this writer, using its
    /// write_onto method.
    fn write<E: Writeable + ?Sized>(&mut self, e: &E) {
        e.write_onto(self)
    }
}
