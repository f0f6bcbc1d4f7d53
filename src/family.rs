use crate::timestamps::DateStamp;
use std::fmt;
use strum::EnumString;

/// The product line a product belongs to, named by the first
/// whitespace-separated word of the product's name.  The family determines
/// how dates are written into the names of its files.
#[derive(Clone, Debug, EnumString, Eq, Hash, PartialEq)]
pub(crate) enum ProductFamily {
    #[strum(serialize = "FNBO")]
    Fnbo,
    #[strum(serialize = "CP")]
    Cp,
    #[strum(serialize = "NF")]
    Nf,
    #[strum(default)]
    Other(String),
}

impl ProductFamily {
    /// Determine the family of the product with the given name
    pub(crate) fn of_product(product: &str) -> ProductFamily {
        let word = product.split_whitespace().next().unwrap_or_default();
        word.parse()
            .unwrap_or_else(|_| ProductFamily::Other(word.to_owned()))
    }

    /// The layout of the date stamp at the end of the family's file stems, or
    /// `None` if files of this family are not known to be dated
    pub(crate) fn date_stamp(&self) -> Option<DateStamp> {
        match self {
            ProductFamily::Fnbo | ProductFamily::Cp => Some(DateStamp::Compact),
            ProductFamily::Nf => Some(DateStamp::Underscored),
            ProductFamily::Other(_) => None,
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        match self {
            ProductFamily::Fnbo => "FNBO",
            ProductFamily::Cp => "CP",
            ProductFamily::Nf => "NF",
            ProductFamily::Other(s) => s,
        }
    }
}

impl fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
