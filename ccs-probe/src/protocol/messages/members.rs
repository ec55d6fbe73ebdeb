use crate::codec::DecodeByteSource;
use crate::codec::DecodeValue;
use crate::codec::EncodeBytesSink;
use crate::codec::EncodeValue;

pub mod server_key_exchange {
    use super::*;

    use ccs_probe_macros::{ByteValue, DecodeEnum, DecodeStruct, EncodeEnum, EncodeStruct};
    use std::io::ErrorKind;

    use crate::{iana, prefixed_list::PrefixedBlob};

    /// The ECCurveType is used in the ServerKeyExchange message to indicate the
    /// type of group.
    ///
    /// [RFC reference](https://datatracker.ietf.org/doc/html/rfc4492#section-5.4)
    #[derive(
        Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, ByteValue, EncodeEnum, DecodeEnum,
    )]
    #[repr(u8)]
    pub enum EcCurveType {
        ExplicitPrime = 1,
        ExplicitChar2 = 2,
        NamedCurve = 3,
    }

    /// Only named curves are supported. RFC 8422 deprecated explicit curves and
    /// no server this probe talks to sends them.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct EcParameters {
        pub named_curve: iana::Group,
    }

    impl DecodeValue for EcParameters {
        fn decode_from(buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
            let (curve_type, buffer) = EcCurveType::decode_from(buffer)?;
            if curve_type != EcCurveType::NamedCurve {
                return Err(std::io::Error::new(
                    ErrorKind::Unsupported,
                    format!("{curve_type:?} curve parameters are not supported"),
                ));
            }
            let (named_curve, buffer) = buffer.decode_value()?;
            Ok((Self { named_curve }, buffer))
        }
    }

    impl EncodeValue for EcParameters {
        fn encode_to(&self, buffer: &mut Vec<u8>) -> std::io::Result<()> {
            buffer.encode_value(&EcCurveType::NamedCurve)?;
            buffer.encode_value(&self.named_curve)?;
            Ok(())
        }
    }

    ///    struct {
    ///        ECParameters    curve_params;
    ///        ECPoint         public;
    ///    } ServerECDHParams;
    #[derive(Debug, Clone, PartialEq, Eq, EncodeStruct, DecodeStruct)]
    pub struct ServerEcdhParams {
        pub curve_params: EcParameters,
        pub public: PrefixedBlob<u8>,
    }

    //    struct {
    //        opaque dh_p<1..2^16-1>;
    //        opaque dh_g<1..2^16-1>;
    //        opaque dh_Ys<1..2^16-1>;
    //    } ServerDHParams;     /* Ephemeral DH parameters */
    #[derive(Debug, Clone, PartialEq, Eq, DecodeStruct, EncodeStruct)]
    pub struct ServerDhParams {
        pub dh_p: PrefixedBlob<u16>,
        pub dh_g: PrefixedBlob<u16>,
        pub dh_ys: PrefixedBlob<u16>,
    }

}
