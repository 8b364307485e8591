use std::borrow::Cow;

use bytes::Bytes;

use crate::frame::Frame;
use crate::{Error, Result};

/// Converts a host value into the frame `write_object` puts on the wire.
///
/// Byte strings (`str`, `[u8]`, `Bytes`) become bulk strings, integers become `:` integers,
/// sequences become arrays and `None` becomes the null bulk string. Implement it for your own
/// types to let them be written directly; the returned frame is encoded like any other.
pub trait ToRedis {
    fn to_redis(&self) -> Result<Frame>;
}

impl ToRedis for Frame {
    fn to_redis(&self) -> Result<Frame> {
        Ok(self.clone())
    }
}

impl<T: ToRedis + ?Sized> ToRedis for &T {
    fn to_redis(&self) -> Result<Frame> {
        (**self).to_redis()
    }
}

impl<T: ToRedis + ?Sized> ToRedis for Box<T> {
    fn to_redis(&self) -> Result<Frame> {
        (**self).to_redis()
    }
}

impl ToRedis for str {
    fn to_redis(&self) -> Result<Frame> {
        Ok(Frame::Bulk(Bytes::copy_from_slice(self.as_bytes())))
    }
}

impl ToRedis for String {
    fn to_redis(&self) -> Result<Frame> {
        self.as_str().to_redis()
    }
}

impl ToRedis for [u8] {
    fn to_redis(&self) -> Result<Frame> {
        Ok(Frame::Bulk(Bytes::copy_from_slice(self)))
    }
}

impl ToRedis for Vec<u8> {
    fn to_redis(&self) -> Result<Frame> {
        self.as_slice().to_redis()
    }
}

impl ToRedis for Bytes {
    fn to_redis(&self) -> Result<Frame> {
        Ok(Frame::Bulk(self.clone()))
    }
}

impl<T: ToRedis> ToRedis for Option<T> {
    fn to_redis(&self) -> Result<Frame> {
        match self {
            Some(value) => value.to_redis(),
            None => Ok(Frame::Null),
        }
    }
}

impl<T: ToRedis> ToRedis for [T] {
    fn to_redis(&self) -> Result<Frame> {
        self.iter()
            .map(ToRedis::to_redis)
            .collect::<Result<Vec<_>>>()
            .map(Frame::Array)
    }
}

// `Vec<u8>` is a byte string, so vectors of anything else are spelled out per element type.
macro_rules! impl_to_redis_for_vec {
    ($($t:ty),*) => {
        $(
            impl ToRedis for Vec<$t> {
                fn to_redis(&self) -> Result<Frame> {
                    self.as_slice().to_redis()
                }
            }
        )*
    };
}

impl_to_redis_for_vec!(
    Frame, String, &str, Bytes, Vec<u8>, i64, i32, u32, Option<String>, Option<Bytes>
);

impl<const N: usize> ToRedis for [u8; N] {
    fn to_redis(&self) -> Result<Frame> {
        self.as_slice().to_redis()
    }
}

impl<T: ToRedis, const N: usize> ToRedis for [T; N] {
    fn to_redis(&self) -> Result<Frame> {
        self.as_slice().to_redis()
    }
}

macro_rules! impl_to_redis_for_int {
    ($($t:ty),*) => {
        $(
            impl ToRedis for $t {
                fn to_redis(&self) -> Result<Frame> {
                    Ok(Frame::Integer(i64::from(*self)))
                }
            }
        )*
    };
}

impl_to_redis_for_int!(i8, i16, i32, i64, u16, u32);

// RESP integers are signed 64-bit, wider values only fit when they happen to be in range.
macro_rules! impl_to_redis_for_wide_int {
    ($($t:ty),*) => {
        $(
            impl ToRedis for $t {
                fn to_redis(&self) -> Result<Frame> {
                    i64::try_from(*self).map(Frame::Integer).map_err(|_| {
                        Error::Unencodable(format!(
                            "{} does not fit in a 64-bit signed integer",
                            self
                        ))
                    })
                }
            }
        )*
    };
}

impl_to_redis_for_wide_int!(u64, usize, isize, i128, u128);

/// The textual form of a request argument.
///
/// Requests are always sent as arrays of bulk strings, so every argument, whatever its host
/// type, is reduced to bytes before being measured and written.
pub trait ToArg {
    fn to_arg(&self) -> Cow<'_, [u8]>;
}

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> Cow<'_, [u8]> {
        (**self).to_arg()
    }
}

impl ToArg for str {
    fn to_arg(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl ToArg for [u8] {
    fn to_arg(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl ToArg for Bytes {
    fn to_arg(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

macro_rules! impl_to_arg_via_display {
    ($($t:ty),*) => {
        $(
            impl ToArg for $t {
                fn to_arg(&self) -> Cow<'_, [u8]> {
                    Cow::Owned(self.to_string().into_bytes())
                }
            }
        )*
    };
}

impl_to_arg_via_display!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char
);

#[cfg(test)]
mod tests {
    use super::*;

    struct Point {
        x: i64,
        y: i64,
    }

    impl ToRedis for Point {
        fn to_redis(&self) -> Result<Frame> {
            vec![self.x, self.y].to_redis()
        }
    }

    #[test]
    fn strings_are_bulk() {
        assert_eq!(
            "hello".to_redis().unwrap(),
            Frame::Bulk(Bytes::from("hello"))
        );
        assert_eq!(
            String::from("hello").to_redis().unwrap(),
            Frame::Bulk(Bytes::from("hello"))
        );
        assert_eq!(
            b"\x00\xff".to_vec().to_redis().unwrap(),
            Frame::Bulk(Bytes::from_static(b"\x00\xff"))
        );
    }

    #[test]
    fn integers() {
        assert_eq!(42i32.to_redis().unwrap(), Frame::Integer(42));
        assert_eq!((-7i64).to_redis().unwrap(), Frame::Integer(-7));
        assert_eq!(5usize.to_redis().unwrap(), Frame::Integer(5));
    }

    #[test]
    fn integer_out_of_range() {
        let result = u64::MAX.to_redis();

        assert!(matches!(result, Err(Error::Unencodable(_))));
    }

    #[test]
    fn none_is_null() {
        assert_eq!(None::<String>.to_redis().unwrap(), Frame::Null);
        assert_eq!(
            Some("x").to_redis().unwrap(),
            Frame::Bulk(Bytes::from("x"))
        );
    }

    #[test]
    fn nested_sequences() {
        let value = vec![
            Frame::Integer(1),
            vec![2i64, 3].to_redis().unwrap(),
            Frame::Integer(4),
        ];

        assert_eq!(
            value.to_redis().unwrap(),
            Frame::Array(vec![
                Frame::Integer(1),
                Frame::Array(vec![Frame::Integer(2), Frame::Integer(3)]),
                Frame::Integer(4),
            ])
        );
    }

    #[test]
    fn custom_type_hook() {
        let point = Point { x: 1, y: -2 };

        assert_eq!(
            point.to_redis().unwrap(),
            Frame::Array(vec![Frame::Integer(1), Frame::Integer(-2)])
        );
        assert_eq!(
            [Point { x: 0, y: 0 }].to_redis().unwrap(),
            Frame::Array(vec![Frame::Array(vec![Frame::Integer(0), Frame::Integer(0)])])
        );
    }

    #[test]
    fn args_are_textual() {
        assert_eq!(&*"SET".to_arg(), b"SET");
        assert_eq!(&*42u64.to_arg(), b"42");
        assert_eq!(&*(-1i32).to_arg(), b"-1");
        assert_eq!(&*1.5f64.to_arg(), b"1.5");
        assert_eq!(&*Bytes::from_static(b"a\r\nb").to_arg(), b"a\r\nb");
    }
}
