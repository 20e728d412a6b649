use rusqlite::Result as DbResult;

use crate::store::Store;

const RECOMMENDATION_COUNT: usize = 5;

const FALLBACK_REPLY: &str = "I'm sorry, I didn't understand that. You can ask for recommendations, menu, bill, or place an order.";

/// Items a chat visitor has asked for, in the order first mentioned.
#[derive(Debug, Default, Clone)]
pub struct Cart {
    items: Vec<(String, u32)>,
}

impl Cart {
    pub fn add(&mut self, name: &str) {
        match self.items.iter_mut().find(|(n, _)| n == name) {
            Some((_, quantity)) => *quantity += 1,
            None => self.items.push((name.to_string(), 1)),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn quantity(&self, name: &str) -> u32 {
        self.items
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, q)| *q)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Priced against the menu; names not on the menu cost nothing.
    pub fn total(&self, store: &Store) -> DbResult<f64> {
        let mut total = 0.0;
        for (name, quantity) in &self.items {
            if let Some(price) = store.price_of(name)? {
                total += price * *quantity as f64;
            }
        }
        Ok(total)
    }
}

/// Answer one chat message. The first keyword found wins, checked in the
/// order recommend, menu, bill, order.
pub fn respond(store: &Store, cart: &mut Cart, message: &str) -> DbResult<String> {
    let message = message.to_lowercase();

    if message.contains("recommend") {
        let recommendations = store.popular_items(RECOMMENDATION_COUNT)?;
        return Ok(format!(
            "Here are some recommendations for you: {}",
            recommendations.join(", ")
        ));
    }

    if message.contains("menu") {
        let menu = store.menu()?;
        return Ok(menu
            .iter()
            .map(|item| format!("{}: ${:?}", item.name, item.price))
            .collect::<Vec<_>>()
            .join("\n"));
    }

    if message.contains("bill") {
        let total = cart.total(store)?;
        return Ok(if total > 0.0 {
            format!("Your total bill is: ${:.2}", total)
        } else {
            "You have no items in your order.".to_string()
        });
    }

    if message.contains("order") {
        let requested = message.replace("order", "");
        for name in requested.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            cart.add(name);
        }
        let total = cart.total(store)?;
        return Ok(format!(
            "You have ordered: {}. Total cost: ${:.2}",
            cart.names().join(", "),
            total
        ));
    }

    Ok(FALLBACK_REPLY.to_string())
}
