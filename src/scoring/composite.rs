// =============================================================================
// Composite Scorer
// =============================================================================
//
// Eight independently capped categories, each an ordered cascade over the
// detector output:
//
//   daily_bias          1.5   D1 EMA stack / EMA50 side + D1 momentum
//   ob_quality          1.5   displacement, timeframe, OB volume, candle quality
//   liquidity           1.5   H1 grab, nearest same-side zone, confluence
//   fu_strength         1.5   FU body, close rejection, OB alignment, volume
//   market_structure    1.5   H4/H1 break of structure + H1 momentum
//   institutional_zone  1.0   H1 close distance to OB mid
//   volume              1.0   recent activity, FU volume, OB volume
//   imbalance           0.5   recent filled / open same-side gaps
//
// Final score = clamp(round(raw_total * 2), 1, 10).

use std::sync::Arc;

use tracing::debug;

use super::breakdown::{final_score, Category, QualityRating, ScoreBreakdown, ScoreCard};
use super::rules::{self, first_at_least, first_at_most};
use crate::features::{FeatureDetector, FuCandle, LiquidityZone, OrderBlock};
use crate::indicators::ema::{ema_last, stacked_direction};
use crate::indicators::volume::mean_volume;
use crate::market_data::PriceSeries;
use crate::types::{Direction, Timeframe};

const MOMENTUM_BARS: usize = 10;
const RECENT_VOLUME_BARS: usize = 10;
const AVERAGE_VOLUME_BARS: usize = 20;
const RECENT_IMBALANCE_BARS: usize = 10;

/// Everything the scorer reads for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub d1: &'a PriceSeries,
    pub h4: &'a PriceSeries,
    pub h1: &'a PriceSeries,
    pub order_block: &'a OrderBlock,
    pub fu: Option<&'a FuCandle>,
    pub zones: &'a [LiquidityZone],
}

/// Moves in `direction` among the last 10 closes, over 10. Only 9 of those
/// closes have a predecessor inside the window, so the share tops out at 0.9.
/// 0.5 with fewer than 10 bars.
pub fn recent_momentum(series: &PriceSeries, direction: Direction) -> f64 {
    let closes = series.closes();
    let n = closes.len();
    if n < MOMENTUM_BARS {
        return 0.5;
    }
    let moves = (n - MOMENTUM_BARS + 1..n)
        .filter(|&i| match direction {
            Direction::Bullish => closes[i] > closes[i - 1],
            Direction::Bearish => closes[i] < closes[i - 1],
        })
        .count();
    moves as f64 / MOMENTUM_BARS as f64
}

/// Shared, stateless scorer.
#[derive(Debug, Clone)]
pub struct CompositeScorer {
    detector: Arc<FeatureDetector>,
}

impl CompositeScorer {
    pub fn new(detector: Arc<FeatureDetector>) -> Self {
        Self { detector }
    }

    pub fn score(&self, input: &ScoreInput<'_>) -> ScoreCard {
        let direction = input.order_block.direction;
        let atr = self.detector.usable_atr(input.h1);

        let mut breakdown = ScoreBreakdown::default();
        let mut notes = Vec::new();

        for category in Category::ALL {
            let points = match category {
                Category::DailyBias => self.daily_bias(input, direction, &mut notes),
                Category::ObQuality => self.ob_quality(input, &mut notes),
                Category::Liquidity => self.liquidity(input, direction, atr, &mut notes),
                Category::FuStrength => self.fu_strength(input, direction, atr, &mut notes),
                Category::MarketStructure => self.market_structure(input, direction, &mut notes),
                Category::InstitutionalZone => self.institutional_zone(input, atr, &mut notes),
                Category::Volume => self.volume(input, &mut notes),
                Category::Imbalance => self.imbalance(input, direction, &mut notes),
            };
            breakdown.set(category, points);
        }

        let raw_total = breakdown.total();
        let score = final_score(raw_total);
        let quality = QualityRating::from_score(score);
        notes.push(format!("Institutional Quality: {}", quality));

        debug!(
            direction = %direction,
            score,
            raw_total = format!("{:.2}", raw_total),
            ob_tf = %input.order_block.timeframe,
            "Composite score computed"
        );

        ScoreCard {
            score,
            raw_total,
            breakdown,
            notes,
            quality,
        }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    fn daily_bias(&self, input: &ScoreInput<'_>, direction: Direction, notes: &mut Vec<String>) -> f64 {
        let closes = input.d1.closes();
        let mut points = 0.0;

        if stacked_direction(&closes, 21, 50, 100) == Some(direction) {
            points += 0.75;
            notes.push("D1: EMA 21/50/100 stacked with the setup".to_string());
        } else if let (Some(&close), Some(ema50)) = (closes.last(), ema_last(&closes, 50)) {
            let on_side = match direction {
                Direction::Bullish => close > ema50,
                Direction::Bearish => close < ema50,
            };
            if on_side {
                points += 0.5;
                notes.push("D1: price on the setup side of EMA50".to_string());
            }
        }

        let momentum = recent_momentum(input.d1, direction);
        if momentum > 0.6 {
            points += 0.25;
            notes.push(format!("D1: recent momentum ({:.1})", momentum));
        }
        points
    }

    fn ob_quality(&self, input: &ScoreInput<'_>, notes: &mut Vec<String>) -> f64 {
        let ob = input.order_block;
        let mut points = 0.0;

        if let Some(tier) = first_at_least(rules::OB_DISPLACEMENT, ob.displacement) {
            points += tier.points;
            notes.push(tier.describe(ob.displacement));
        }

        let tf_points = match ob.timeframe {
            Timeframe::H4 | Timeframe::D1 => 0.5,
            Timeframe::H1 => 0.3,
        };
        points += tf_points;
        notes.push(format!("OB: {} institutional zone", ob.timeframe));

        if let Some(tier) = first_at_least(rules::OB_VOLUME, ob.volume_ratio) {
            points += tier.points;
            notes.push(tier.describe(ob.volume_ratio));
        }
        if let Some(tier) = first_at_least(rules::OB_QUALITY, ob.quality) {
            points += tier.points;
            notes.push(tier.describe(ob.quality));
        }
        points
    }

    fn liquidity(
        &self,
        input: &ScoreInput<'_>,
        direction: Direction,
        atr: Option<f64>,
        notes: &mut Vec<String>,
    ) -> f64 {
        let mut points = 0.0;

        let grab = self.detector.liquidity_grab(input.h1);
        if let Some(grab) = &grab {
            points += 0.5;
            if grab.strength >= 1.0 {
                points += 0.25;
                notes.push(format!("Liq: strong {} ({:.2})", grab.kind, grab.strength));
            } else {
                notes.push(format!("Liq: {} confirmed", grab.kind));
            }
        }

        let strongest = input
            .zones
            .iter()
            .filter(|z| z.kind.serves(direction))
            .max_by(|a, b| a.strength.total_cmp(&b.strength));
        if let (Some(zone), Some(atr), Some(close)) = (strongest, atr, input.h1.last_close()) {
            let distance = (close - zone.price).abs() / atr;
            if let Some(tier) = first_at_most(rules::ZONE_PROXIMITY, distance) {
                points += tier.points;
                notes.push(format!("{} {}", tier.note, zone.kind));
            }
        }

        if grab.is_some() && !input.zones.is_empty() {
            points += 0.25;
            notes.push("Liq: grab with resting liquidity".to_string());
        }
        points
    }

    fn fu_strength(
        &self,
        input: &ScoreInput<'_>,
        direction: Direction,
        atr: Option<f64>,
        notes: &mut Vec<String>,
    ) -> f64 {
        let Some(fu) = input.fu else {
            return 0.0;
        };
        let mut points = 0.0;

        if let Some(atr) = atr {
            let body_atr = fu.body_size / atr;
            if let Some(tier) = first_at_least(rules::FU_BODY, body_atr) {
                points += tier.points;
                notes.push(tier.describe(body_atr));
            }
        }

        let rejection = match fu.direction {
            Direction::Bullish => fu.close_frac,
            Direction::Bearish => 1.0 - fu.close_frac,
        };
        if let Some(tier) = first_at_least(rules::FU_REJECTION, rejection) {
            points += tier.points;
            notes.push(tier.note.to_string());
        }

        if fu.direction == direction {
            points += 0.3;
            notes.push("FU: aligned with OB".to_string());
        }

        if let Some(tier) = first_at_least(rules::FU_VOLUME, fu.volume_ratio) {
            points += tier.points;
            notes.push(tier.describe(fu.volume_ratio));
        }
        points
    }

    fn market_structure(&self, input: &ScoreInput<'_>, direction: Direction, notes: &mut Vec<String>) -> f64 {
        let h4 = self.detector.structure_break(input.h4);
        let h1 = self.detector.structure_break(input.h1);
        let mut points = 0.0;

        if h4.confirms(direction) {
            points += 0.75;
            notes.push("MS: H4 break of structure".to_string());
        } else if h1.confirms(direction) {
            points += 0.5;
            notes.push("MS: H1 break of structure".to_string());
        } else if h1.strength >= 0.7 || h4.strength >= 0.7 {
            points += 0.25;
            notes.push("MS: strong structure forming".to_string());
        }

        if h1.direction == Some(direction) && h4.direction == Some(direction) {
            points += 0.5;
            notes.push("MS: H1 and H4 agree".to_string());
        }

        let momentum = recent_momentum(input.h1, direction);
        if momentum >= 0.7 {
            points += 0.25;
            notes.push(format!("MS: recent momentum ({:.1})", momentum));
        }
        points
    }

    fn institutional_zone(&self, input: &ScoreInput<'_>, atr: Option<f64>, notes: &mut Vec<String>) -> f64 {
        let (Some(atr), Some(close)) = (atr, input.h1.last_close()) else {
            return 0.0;
        };
        let distance = (close - input.order_block.body_mid()).abs() / atr;
        match first_at_most(rules::OB_PROXIMITY, distance) {
            Some(tier) => {
                notes.push(tier.describe(distance));
                tier.points
            }
            None => 0.0,
        }
    }

    fn volume(&self, input: &ScoreInput<'_>, notes: &mut Vec<String>) -> f64 {
        let mut points = 0.0;

        if input.h1.len() >= AVERAGE_VOLUME_BARS {
            let recent = mean_volume(input.h1.tail(RECENT_VOLUME_BARS));
            let average = mean_volume(input.h1.tail(AVERAGE_VOLUME_BARS));
            if let (Some(recent), Some(average)) = (recent, average) {
                let ratio = if average > 0.0 { recent / average } else { 1.0 };
                if let Some(tier) = first_at_least(rules::VOLUME_ACTIVITY, ratio) {
                    points += tier.points;
                    notes.push(tier.describe(ratio));
                }
            }
        }

        if let Some(fu) = input.fu.filter(|fu| fu.volume_ratio >= 1.5) {
            points += 0.3;
            notes.push(format!("Volume: FU confirmation ({:.2})", fu.volume_ratio));
        }
        if input.order_block.volume_ratio >= 1.5 {
            points += 0.2;
            notes.push(format!("Volume: significant OB ({:.2})", input.order_block.volume_ratio));
        }
        points
    }

    fn imbalance(&self, input: &ScoreInput<'_>, direction: Direction, notes: &mut Vec<String>) -> f64 {
        let cutoff = input.h1.len().saturating_sub(RECENT_IMBALANCE_BARS);
        let recent: Vec<_> = self
            .detector
            .imbalances(input.h1)
            .into_iter()
            .filter(|imb| imb.index >= cutoff)
            .collect();
        let mut points = 0.0;

        if recent.iter().any(|imb| imb.filled) {
            points += 0.25;
            notes.push("Imbalance: recent fill".to_string());
        }
        if recent.iter().any(|imb| !imb.filled && imb.direction == direction) {
            points += 0.25;
            notes.push("Imbalance: open gap ahead".to_string());
        }
        points
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PriceBar;
    use crate::test_support::{bar, flat_series, scenario_a};
    use proptest::prelude::*;

    fn scorer() -> CompositeScorer {
        CompositeScorer::new(Arc::new(FeatureDetector::default()))
    }

    fn scenario_a_card() -> ScoreCard {
        let detector = FeatureDetector::default();
        let s = scenario_a();
        let ob = detector
            .best_order_block(
                &detector.order_blocks(&s, Timeframe::H4),
                &detector.order_blocks(&s, Timeframe::H1),
            )
            .unwrap();
        let fu = detector.fu_candle(&s);
        let zones = detector.liquidity_zones(&s, Timeframe::H1);
        scorer().score(&ScoreInput {
            d1: &s,
            h4: &s,
            h1: &s,
            order_block: &ob,
            fu: fu.as_ref(),
            zones: &zones,
        })
    }

    fn sample_block(direction: Direction) -> OrderBlock {
        OrderBlock {
            index: 30,
            direction,
            body_low: 100.0,
            body_high: 101.0,
            wick_low: 99.5,
            wick_high: 101.5,
            timeframe: Timeframe::H1,
            displacement: 2.5,
            volume: 100.0,
            volume_ratio: 1.3,
            quality: 0.7,
        }
    }

    #[test]
    fn scenario_a_breakdown() {
        let card = scenario_a_card();
        let b = card.breakdown;
        let near = |a: f64, e: f64| (a - e).abs() < 1e-9;
        assert!(near(b.daily_bias, 0.75));
        assert!(near(b.ob_quality, 1.5));
        assert!(near(b.liquidity, 1.0));
        assert!(near(b.fu_strength, 1.5));
        assert!(near(b.market_structure, 0.0));
        assert!(near(b.institutional_zone, 0.7));
        assert!(near(b.volume, 0.5));
        assert!(near(b.imbalance, 0.0));
        assert!(near(card.raw_total, 5.95));
        assert_eq!(card.score, 10);
        assert_eq!(card.quality, QualityRating::Exceptional);
        assert_eq!(card.notes.last().unwrap(), "Institutional Quality: EXCEPTIONAL");
    }

    #[test]
    fn flat_market_scores_minimum() {
        let s = flat_series(150);
        let card = scorer().score(&ScoreInput {
            d1: &s,
            h4: &s,
            h1: &s,
            order_block: &sample_block(Direction::Bullish),
            fu: None,
            zones: &[],
        });
        // Only the timeframe term (0.3) and the OB table tiers (0.3 + 0.15 + 0.15) apply.
        assert!((card.raw_total - 0.9).abs() < 1e-12);
        assert_eq!(card.score, 2);
        assert_eq!(card.breakdown.fu_strength, 0.0);
        assert_eq!(card.breakdown.institutional_zone, 0.0);
    }

    #[test]
    fn momentum_share() {
        let s = scenario_a();
        assert!((recent_momentum(&s, Direction::Bullish) - 0.1).abs() < 1e-12);
        // Bars 141..=148 close lower; bar 140's drop falls outside the window.
        assert!((recent_momentum(&s, Direction::Bearish) - 0.8).abs() < 1e-12);
        assert_eq!(recent_momentum(&s.trimmed(5), Direction::Bullish), 0.5);
    }

    #[test]
    fn momentum_share_tops_out_at_nine_tenths() {
        let rising = PriceSeries::new((0..30).map(crate::test_support::baseline_bar).collect());
        assert!((recent_momentum(&rising, Direction::Bullish) - 0.9).abs() < 1e-12);
        assert!((recent_momentum(&rising.clone().trimmed(10), Direction::Bullish) - 0.9).abs() < 1e-12);
        assert_eq!(recent_momentum(&rising, Direction::Bearish), 0.0);
    }

    #[test]
    fn deterministic_and_serde_stable() {
        let a = scenario_a_card();
        let b = scenario_a_card();
        assert_eq!(a, b);

        let json = serde_json::to_string(&a).unwrap();
        let back: ScoreCard = serde_json::from_str(&json).unwrap();
        assert_eq!(back.score, a.score);
        assert_eq!(back.notes, a.notes);
        assert_eq!(back.breakdown, a.breakdown);
    }

    fn random_walk() -> impl Strategy<Value = Vec<PriceBar>> {
        prop::collection::vec((-1.0f64..1.0, 0.0f64..1.0, 1.0f64..1000.0), 0..180).prop_map(|steps| {
            let mut price = 100.0;
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (step, wick, volume))| {
                    let open = price;
                    let close = (price + step).max(1.0);
                    price = close;
                    bar(i, open, open.max(close) + wick, open.min(close) - wick, close, volume)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn score_always_in_range(
            bars in random_walk(),
            bullish in any::<bool>(),
            displacement in 0.0f64..10.0,
            quality in 0.0f64..1.0,
            vr in 0.0f64..5.0,
        ) {
            let s = PriceSeries::new(bars);
            let direction = if bullish { Direction::Bullish } else { Direction::Bearish };
            let mut ob = sample_block(direction);
            ob.displacement = displacement;
            ob.quality = quality;
            ob.volume_ratio = vr;
            let detector = FeatureDetector::default();
            let fu = detector.fu_candle(&s);
            let zones = detector.liquidity_zones(&s, Timeframe::H1);
            let card = scorer().score(&ScoreInput {
                d1: &s, h4: &s, h1: &s,
                order_block: &ob,
                fu: fu.as_ref(),
                zones: &zones,
            });
            prop_assert!(card.raw_total <= 10.0 + 1e-9);
            prop_assert!((1..=10).contains(&card.score));
            for (category, points) in card.breakdown.entries() {
                prop_assert!(points >= 0.0 && points <= category.cap());
            }
        }
    }
}
