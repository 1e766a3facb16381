use levo_models::AssetConfig;

/// Configured assets, in config order, addressable by symbol.
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    assets: Vec<AssetConfig>,
}

impl AssetTable {
    pub fn new(assets: Vec<AssetConfig>) -> Self {
        Self { assets }
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&AssetConfig> {
        self.assets
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetConfig> {
        self.assets.iter()
    }
}
