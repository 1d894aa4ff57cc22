//! Coins spent by a transaction, keyed by outpoint.

use hnsw_types::{Coin, Outpoint};
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct CoinView {
    coins: HashMap<Outpoint, Coin>,
}

impl CoinView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_coins<'a>(coins: impl IntoIterator<Item = &'a Coin>) -> Self {
        let mut view = Self::new();
        for coin in coins {
            view.add(coin.clone());
        }
        view
    }

    pub fn add(&mut self, coin: Coin) {
        self.coins.insert(coin.outpoint, coin);
    }

    pub fn get(&self, outpoint: &Outpoint) -> Option<&Coin> {
        self.coins.get(outpoint)
    }
}
