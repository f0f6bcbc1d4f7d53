//! The table mapping product names to AWS accounts & S3 folders
use crate::family::ProductFamily;
use crate::s3::S3Location;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Where a product's files live
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ProductConfig {
    pub(crate) name: String,
    pub(crate) account_id: String,
    pub(crate) bucket: String,
    pub(crate) folder_path: String,
}

impl ProductConfig {
    pub(crate) fn family(&self) -> ProductFamily {
        ProductFamily::of_product(&self.name)
    }

    /// The product's default folder
    pub(crate) fn location(&self) -> S3Location {
        S3Location::new(self.bucket.clone(), self.folder_path.clone())
    }
}

impl From<CatalogRow> for ProductConfig {
    fn from(row: CatalogRow) -> ProductConfig {
        ProductConfig {
            name: row.product,
            // Account IDs may be wrapped in literal quotes
            account_id: row.account_id.replace('"', ""),
            bucket: row.bucket_name,
            folder_path: row.folder_path,
        }
    }
}

/// A row of the catalog CSV file.  Additional columns are ignored.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct CatalogRow {
    product: String,
    account_id: String,
    bucket_name: String,
    folder_path: String,
}

/// All configured products, in file order
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ProductCatalog {
    products: Vec<ProductConfig>,
}

impl ProductCatalog {
    pub(crate) fn load(path: &Path) -> Result<ProductCatalog, CatalogError> {
        let fp = fs_err::File::open(path)?;
        ProductCatalog::from_reader(fp)
    }

    pub(crate) fn from_reader<R: Read>(reader: R) -> Result<ProductCatalog, CatalogError> {
        let mut products: Vec<ProductConfig> = Vec::new();
        for row in csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader)
            .into_deserialize::<CatalogRow>()
        {
            let product = ProductConfig::from(row?);
            if product.name.is_empty() {
                return Err(CatalogError::Unnamed);
            }
            if products.iter().any(|p| p.name == product.name) {
                return Err(CatalogError::Duplicate(product.name));
            }
            products.push(product);
        }
        Ok(ProductCatalog { products })
    }

    pub(crate) fn get(&self, name: &str) -> Result<&ProductConfig, CatalogError> {
        self.products
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| CatalogError::Unknown {
                name: name.to_owned(),
                available: self
                    .products
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, ProductConfig> {
        self.products.iter()
    }
}

#[derive(Debug, Error)]
pub(crate) enum CatalogError {
    #[error(transparent)]
    Read(#[from] std::io::Error),
    #[error("failed to parse product catalog")]
    Parse(#[from] csv::Error),
    #[error("product catalog contains a row with an empty product name")]
    Unnamed,
    #[error("product {0:?} is listed more than once in the catalog")]
    Duplicate(String),
    #[error("unknown product {name:?}; available products: {available}")]
    Unknown { name: String, available: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    static CATALOG: &str = concat!(
        "Product,AccountId,BucketName,FolderPath,Owner\n",
        "FNBO Daily,\"\"\"012345678901\"\"\",fnbo-drop,outbound/transactions/,ops\n",
        " NF Weekly , 210987654321 ,nf-drop,exports/,ops\n",
    );

    #[test]
    fn parse_catalog() {
        let catalog = ProductCatalog::from_reader(CATALOG.as_bytes()).unwrap();
        let names = catalog.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["FNBO Daily", "NF Weekly"]);
        let fnbo = catalog.get("FNBO Daily").unwrap();
        assert_eq!(
            fnbo,
            &ProductConfig {
                name: "FNBO Daily".into(),
                account_id: "012345678901".into(),
                bucket: "fnbo-drop".into(),
                folder_path: "outbound/transactions/".into(),
            }
        );
        assert_eq!(fnbo.family(), ProductFamily::Fnbo);
        assert_eq!(
            fnbo.location().to_string(),
            "s3://fnbo-drop/outbound/transactions/"
        );
        let nf = catalog.get("NF Weekly").unwrap();
        assert_eq!(nf.account_id, "210987654321");
        assert_eq!(nf.family(), ProductFamily::Nf);
    }

    #[test]
    fn unknown_product_lists_available() {
        let catalog = ProductCatalog::from_reader(CATALOG.as_bytes()).unwrap();
        let e = catalog.get("CP Monthly").unwrap_err();
        assert_eq!(
            e.to_string(),
            r#"unknown product "CP Monthly"; available products: FNBO Daily, NF Weekly"#
        );
    }

    #[test]
    fn duplicate_product() {
        let csv = "Product,AccountId,BucketName,FolderPath\nCP,1,b,p/\nCP,2,b,q/\n";
        assert_matches!(
            ProductCatalog::from_reader(csv.as_bytes()),
            Err(CatalogError::Duplicate(name)) if name == "CP"
        );
    }

    #[test]
    fn missing_column() {
        let csv = "Product,AccountId,BucketName\nCP,1,b\n";
        assert_matches!(
            ProductCatalog::from_reader(csv.as_bytes()),
            Err(CatalogError::Parse(_))
        );
    }

    #[test]
    fn load_from_file() {
        let tmpdir = tempfile::tempdir().unwrap();
        let path = tmpdir.path().join("products.csv");
        fs_err::write(&path, CATALOG).unwrap();
        let catalog = ProductCatalog::load(&path).unwrap();
        assert_eq!(catalog.iter().count(), 2);
        assert_matches!(
            ProductCatalog::load(&tmpdir.path().join("missing.csv")),
            Err(CatalogError::Read(_))
        );
    }
}
