//! Payload slicing for concatenated messages. Cuts land on glyph
//! boundaries of the encoded form, never inside a GSM escape pair, a UCS-2
//! code unit, or a surrogate pair.

/// What counts as an unsplittable unit in an encoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Boundary {
    /// GSM 03.38 septet stream: 0x1B always introduces a two-octet escape
    /// pair.
    Gsm7Escape,
    /// UCS-2: two-octet units, with high+low surrogates forming one glyph.
    TwoByteUnits,
    /// No structure; cut anywhere.
    Octets,
}

/// Slice `payload` into chunks of at most `limit` octets, backing a cut off
/// when it would land inside a unit. Empty input yields no chunks.
pub(crate) fn split(payload: &[u8], boundary: Boundary, limit: usize) -> Vec<&[u8]> {
    debug_assert!(limit >= 4, "limit must fit any single glyph unit");
    let mut parts = Vec::new();
    let mut start = 0;
    while start < payload.len() {
        let mut end = (start + limit).min(payload.len());
        if end < payload.len() {
            match boundary {
                Boundary::Octets => {}
                Boundary::Gsm7Escape => {
                    // An escape introducer at the cut belongs with the octet
                    // after it.
                    if payload[end - 1] == 0x1B {
                        end -= 1;
                    }
                }
                Boundary::TwoByteUnits => {
                    end -= (end - start) % 2;
                    if end >= start + 2 {
                        let unit = u16::from_be_bytes([payload[end - 2], payload[end - 1]]);
                        if (0xD800..0xDC00).contains(&unit) {
                            end -= 2;
                        }
                    }
                }
            }
        }
        parts.push(&payload[start..end]);
        start = end;
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{gsm7, ucs2};

    #[test]
    fn plain_octets_split_at_limit() {
        let payload = vec![0u8; 300];
        let parts = split(&payload, Boundary::Octets, 133);
        assert_eq!(parts.iter().map(|p| p.len()).collect::<Vec<_>>(), [133, 133, 34]);
    }

    #[test]
    fn empty_payload_yields_no_parts() {
        assert!(split(&[], Boundary::Octets, 133).is_empty());
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let payload = vec![0u8; 266];
        assert_eq!(split(&payload, Boundary::Octets, 133).len(), 2);
    }

    #[test]
    fn gsm7_escape_pair_is_never_cut() {
        // Position the escape pair to straddle the limit: 7 plain octets,
        // then €(1B 65) with limit 8 puts the introducer at index 7.
        let encoded = gsm7::encode("charge €5 now");
        assert_eq!(encoded[7], 0x1B);
        let parts = split(&encoded, Boundary::Gsm7Escape, 8);
        assert_eq!(parts[0].len(), 7);
        assert_eq!(parts[1][0], 0x1B);
        assert_eq!(parts[1][1], 0x65);

        let rejoined: Vec<u8> = parts.concat();
        assert_eq!(gsm7::decode(&rejoined), b"charge \xe2\x82\xac5 now");
    }

    #[test]
    fn gsm7_parts_decode_independently() {
        let text = "€€€€€€€€€€";
        let encoded = gsm7::encode(text);
        for part in split(&encoded, Boundary::Gsm7Escape, 5) {
            // every chunk holds whole escape pairs
            assert_eq!(part.len() % 2, 0);
            assert!(!gsm7::decode(part).is_empty());
        }
    }

    #[test]
    fn ucs2_cuts_on_even_offsets() {
        let encoded = ucs2::encode("abcdefgh");
        let parts = split(&encoded, Boundary::TwoByteUnits, 5);
        assert_eq!(parts.iter().map(|p| p.len()).collect::<Vec<_>>(), [4, 4, 4, 4]);
    }

    #[test]
    fn ucs2_surrogate_pair_is_never_cut() {
        // "ab😀cd": the pair occupies octets 4..8; a limit of 6 would cut it.
        let encoded = ucs2::encode("ab😀cd");
        let parts = split(&encoded, Boundary::TwoByteUnits, 6);
        assert_eq!(parts[0].len(), 4);
        let text: Vec<u8> = parts
            .iter()
            .flat_map(|p| ucs2::decode(p))
            .collect();
        assert_eq!(text, "ab😀cd".as_bytes());
    }

    #[test]
    fn concatenated_parts_reassemble() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Nam consequat \
                    nisl enim, vel finibus neque aliquet sit amet. Interdum et malesuada \
                    fames ac ante ipsum primis in faucibus.";
        let encoded = gsm7::encode(text);
        let parts = split(&encoded, Boundary::Gsm7Escape, 152);
        assert_eq!(parts.len(), 2);
        assert_eq!(gsm7::decode(&parts.concat()), text.as_bytes());
    }
}
