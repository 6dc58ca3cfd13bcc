// Synthetic monthly business data for trying the dashboard without a file

use rand::Rng;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const HEADER: &str =
    "Month,Revenue,Expenses,Profit,New_Customers,Customer_Satisfaction,Marketing_Spend";

const BASE_REVENUE: f64 = 20_000.0;

/// Twelve months of revenue that trends up ~5% a month with ±10% noise.
/// Expenses track 65% of revenue and marketing 15%.
pub fn monthly_business_csv<R: Rng>(rng: &mut R) -> String {
    let mut csv = String::from(HEADER);
    csv.push('\n');

    for (i, month) in MONTHS.iter().enumerate() {
        let growth = 1.0 + i as f64 * 0.05;
        let noise = (rng.gen::<f64>() - 0.5) * 0.2;

        let revenue = (BASE_REVENUE * growth * (1.0 + noise)).floor() as i64;
        let expenses = (revenue as f64 * 0.65).floor() as i64;
        let profit = revenue - expenses;
        let customers = (revenue as f64 / 200.0 + rng.gen::<f64>() * 20.0).floor() as i64;
        let satisfaction = 7.5 + rng.gen::<f64>() * 2.0;
        let marketing = (revenue as f64 * 0.15).floor() as i64;

        csv.push_str(&format!(
            "{},{},{},{},{},{:.1},{}\n",
            month, revenue, expenses, profit, customers, satisfaction, marketing
        ));
    }

    csv
}
