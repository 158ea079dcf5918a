//! Content-stream operators.

use super::objects::Dict;
use crate::io::SeekableStream;
use std::fmt;

/// Content-stream operator names. Known operators are zero-allocation
/// variants; anything else keeps its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Keyword {
    // Graphics state
    Q,  // restore (uppercase Q)
    Qq, // save (lowercase q)
    Cm, // concat matrix
    Ww, // line width (lowercase w)
    J,  // line cap (uppercase J)
    Jj, // line join (lowercase j)
    M,  // miter limit
    D,  // dash pattern
    Ri, // rendering intent
    I,  // flatness
    Gs, // graphics state dict

    // Path construction
    Mm, // moveto (lowercase m)
    L,  // lineto
    C,  // curveto
    V,
    Y,
    H,  // closepath
    Re, // rectangle

    // Path painting
    S,      // stroke (uppercase)
    Ss,     // close+stroke (lowercase s)
    F,      // fill (uppercase)
    Ff,     // fill (lowercase f)
    FStar,  // f*
    B,      // fill+stroke
    BStar,  // B*
    Bb,     // close+fill+stroke (lowercase b)
    BbStar, // b*
    N,      // end path

    // Clipping
    WClip, // W
    WStar, // W*

    // Text object
    BT,
    ET,

    // Text state
    Tc,
    Tw,
    Tz,
    TL,
    Tf,
    Tr,
    Ts,

    // Text positioning
    Td,
    TD,
    Tm,
    TStar, // T*

    // Text showing
    Tj,
    TJ,
    Quote,       // '
    DoubleQuote, // "

    // Color
    CS,
    Cs, // lowercase
    SC,
    SCN,
    Sc,  // lowercase
    Scn, // lowercase
    G,
    Gg, // lowercase g
    RG,
    Rg, // lowercase
    K,
    Kk, // lowercase k

    // XObject and shading
    Do,
    Sh,

    // Inline image
    BI,
    ID,
    EI,

    // Marked content
    MP,
    DP,
    BMC,
    BDC,
    EMC,

    // Type3 glyphs
    D0,
    D1,

    // Compatibility
    BX,
    EX,

    /// Unrecognised operator (preserves original bytes)
    Unknown(Vec<u8>),
}

impl Keyword {
    pub fn from_bytes(b: &[u8]) -> Self {
        match b {
            b"Q" => Keyword::Q,
            b"q" => Keyword::Qq,
            b"cm" => Keyword::Cm,
            b"w" => Keyword::Ww,
            b"J" => Keyword::J,
            b"j" => Keyword::Jj,
            b"M" => Keyword::M,
            b"d" => Keyword::D,
            b"ri" => Keyword::Ri,
            b"i" => Keyword::I,
            b"gs" => Keyword::Gs,
            b"m" => Keyword::Mm,
            b"l" => Keyword::L,
            b"c" => Keyword::C,
            b"v" => Keyword::V,
            b"y" => Keyword::Y,
            b"h" => Keyword::H,
            b"re" => Keyword::Re,
            b"S" => Keyword::S,
            b"s" => Keyword::Ss,
            b"F" => Keyword::F,
            b"f" => Keyword::Ff,
            b"f*" => Keyword::FStar,
            b"B" => Keyword::B,
            b"B*" => Keyword::BStar,
            b"b" => Keyword::Bb,
            b"b*" => Keyword::BbStar,
            b"n" => Keyword::N,
            b"W" => Keyword::WClip,
            b"W*" => Keyword::WStar,
            b"BT" => Keyword::BT,
            b"ET" => Keyword::ET,
            b"Tc" => Keyword::Tc,
            b"Tw" => Keyword::Tw,
            b"Tz" => Keyword::Tz,
            b"TL" => Keyword::TL,
            b"Tf" => Keyword::Tf,
            b"Tr" => Keyword::Tr,
            b"Ts" => Keyword::Ts,
            b"Td" => Keyword::Td,
            b"TD" => Keyword::TD,
            b"Tm" => Keyword::Tm,
            b"T*" => Keyword::TStar,
            b"Tj" => Keyword::Tj,
            b"TJ" => Keyword::TJ,
            b"'" => Keyword::Quote,
            b"\"" => Keyword::DoubleQuote,
            b"CS" => Keyword::CS,
            b"cs" => Keyword::Cs,
            b"SC" => Keyword::SC,
            b"SCN" => Keyword::SCN,
            b"sc" => Keyword::Sc,
            b"scn" => Keyword::Scn,
            b"G" => Keyword::G,
            b"g" => Keyword::Gg,
            b"RG" => Keyword::RG,
            b"rg" => Keyword::Rg,
            b"K" => Keyword::K,
            b"k" => Keyword::Kk,
            b"Do" => Keyword::Do,
            b"sh" => Keyword::Sh,
            b"BI" => Keyword::BI,
            b"ID" => Keyword::ID,
            b"EI" => Keyword::EI,
            b"MP" => Keyword::MP,
            b"DP" => Keyword::DP,
            b"BMC" => Keyword::BMC,
            b"BDC" => Keyword::BDC,
            b"EMC" => Keyword::EMC,
            b"d0" => Keyword::D0,
            b"d1" => Keyword::D1,
            b"BX" => Keyword::BX,
            b"EX" => Keyword::EX,
            _ => Keyword::Unknown(b.to_vec()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Keyword::Q => b"Q",
            Keyword::Qq => b"q",
            Keyword::Cm => b"cm",
            Keyword::Ww => b"w",
            Keyword::J => b"J",
            Keyword::Jj => b"j",
            Keyword::M => b"M",
            Keyword::D => b"d",
            Keyword::Ri => b"ri",
            Keyword::I => b"i",
            Keyword::Gs => b"gs",
            Keyword::Mm => b"m",
            Keyword::L => b"l",
            Keyword::C => b"c",
            Keyword::V => b"v",
            Keyword::Y => b"y",
            Keyword::H => b"h",
            Keyword::Re => b"re",
            Keyword::S => b"S",
            Keyword::Ss => b"s",
            Keyword::F => b"F",
            Keyword::Ff => b"f",
            Keyword::FStar => b"f*",
            Keyword::B => b"B",
            Keyword::BStar => b"B*",
            Keyword::Bb => b"b",
            Keyword::BbStar => b"b*",
            Keyword::N => b"n",
            Keyword::WClip => b"W",
            Keyword::WStar => b"W*",
            Keyword::BT => b"BT",
            Keyword::ET => b"ET",
            Keyword::Tc => b"Tc",
            Keyword::Tw => b"Tw",
            Keyword::Tz => b"Tz",
            Keyword::TL => b"TL",
            Keyword::Tf => b"Tf",
            Keyword::Tr => b"Tr",
            Keyword::Ts => b"Ts",
            Keyword::Td => b"Td",
            Keyword::TD => b"TD",
            Keyword::Tm => b"Tm",
            Keyword::TStar => b"T*",
            Keyword::Tj => b"Tj",
            Keyword::TJ => b"TJ",
            Keyword::Quote => b"'",
            Keyword::DoubleQuote => b"\"",
            Keyword::CS => b"CS",
            Keyword::Cs => b"cs",
            Keyword::SC => b"SC",
            Keyword::SCN => b"SCN",
            Keyword::Sc => b"sc",
            Keyword::Scn => b"scn",
            Keyword::G => b"G",
            Keyword::Gg => b"g",
            Keyword::RG => b"RG",
            Keyword::Rg => b"rg",
            Keyword::K => b"K",
            Keyword::Kk => b"k",
            Keyword::Do => b"Do",
            Keyword::Sh => b"sh",
            Keyword::BI => b"BI",
            Keyword::ID => b"ID",
            Keyword::EI => b"EI",
            Keyword::MP => b"MP",
            Keyword::DP => b"DP",
            Keyword::BMC => b"BMC",
            Keyword::BDC => b"BDC",
            Keyword::EMC => b"EMC",
            Keyword::D0 => b"d0",
            Keyword::D1 => b"d1",
            Keyword::BX => b"BX",
            Keyword::EX => b"EX",
            Keyword::Unknown(bytes) => bytes.as_slice(),
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

/// Parameters and raw bytes of an inline image (`BI ... ID ... EI`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineImage {
    pub params: Dict,
    pub data: Option<SeekableStream>,
}

/// An operator token, optionally carrying an inline image.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    keyword: Keyword,
    image: Option<Box<InlineImage>>,
}

impl Operator {
    pub fn new(keyword: Keyword) -> Self {
        Self {
            keyword,
            image: None,
        }
    }

    pub fn from_bytes(name: &[u8]) -> Self {
        Self::new(Keyword::from_bytes(name))
    }

    pub(crate) fn with_image(keyword: Keyword, image: InlineImage) -> Self {
        Self {
            keyword,
            image: Some(Box::new(image)),
        }
    }

    pub fn keyword(&self) -> &Keyword {
        &self.keyword
    }

    pub fn name(&self) -> &[u8] {
        self.keyword.as_bytes()
    }

    pub fn image(&self) -> Option<&InlineImage> {
        self.image.as_deref()
    }

    pub fn image_params(&self) -> Option<&Dict> {
        self.image.as_ref().map(|image| &image.params)
    }

    pub fn image_data(&self) -> Option<&SeekableStream> {
        self.image.as_ref().and_then(|image| image.data.as_ref())
    }

    pub(crate) fn take_image(&mut self) -> Option<InlineImage> {
        self.image.take().map(|image| *image)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.keyword, f)
    }
}
