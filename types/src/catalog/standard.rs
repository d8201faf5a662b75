use super::{
    EventCategory, EventChoice, FinancialEventDefinition, ProfessionDefinition, ProfessionTier,
};

#[allow(clippy::too_many_arguments)]
fn profession(
    id: &str,
    name: &str,
    description: &str,
    tier: ProfessionTier,
    monthly_salary: i64,
    starting_bonus: i64,
    salary_growth_rate: f64,
    tax_rate: f64,
    education_cost_paid: i64,
    medical_expense_modifier: f64,
    benefits: bool,
) -> ProfessionDefinition {
    ProfessionDefinition {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        tier,
        monthly_salary,
        starting_bonus,
        salary_growth_rate,
        tax_rate,
        education_cost_paid,
        medical_expense_modifier,
        has_health_insurance: benefits,
        has_retirement_plan: benefits,
    }
}

pub(super) fn professions() -> Vec<ProfessionDefinition> {
    use ProfessionTier::*;
    vec![
        profession(
            "street_sweeper",
            "Street Sweeper",
            "Keeps the city clean. Steady but modest pay.",
            Low,
            2200,
            0,
            0.01,
            0.10,
            0,
            1.0,
            false,
        ),
        profession(
            "cashier",
            "Cashier",
            "Front line of retail. Flexible hours, low pay.",
            Low,
            2500,
            500,
            0.02,
            0.12,
            0,
            1.0,
            false,
        ),
        profession(
            "chef",
            "Chef",
            "Runs a busy kitchen after culinary school.",
            Medium,
            3800,
            500,
            0.04,
            0.15,
            25_000,
            1.0,
            false,
        ),
        profession(
            "teacher",
            "Teacher",
            "Shapes young minds. Good benefits.",
            Medium,
            4200,
            1000,
            0.025,
            0.16,
            40_000,
            0.5,
            true,
        ),
        profession(
            "police_officer",
            "Police Officer",
            "Protects the community with a public pension.",
            Medium,
            4800,
            2000,
            0.03,
            0.18,
            15_000,
            0.5,
            true,
        ),
        profession(
            "engineer",
            "Engineer",
            "Designs and builds. Strong salary growth.",
            High,
            7500,
            5000,
            0.05,
            0.22,
            80_000,
            0.5,
            true,
        ),
        profession(
            "programmer",
            "Programmer",
            "Writes software. Big signing bonus.",
            High,
            8200,
            8000,
            0.06,
            0.20,
            50_000,
            0.5,
            true,
        ),
        profession(
            "pilot",
            "Pilot",
            "Flies commercial routes after years of training.",
            High,
            9500,
            7000,
            0.035,
            0.24,
            100_000,
            0.5,
            true,
        ),
        profession(
            "lawyer",
            "Lawyer",
            "Argues cases. Expensive degree, high pay.",
            High,
            10_500,
            5000,
            0.045,
            0.26,
            150_000,
            0.5,
            true,
        ),
        profession(
            "doctor",
            "Doctor",
            "Saves lives. The longest and costliest education.",
            High,
            12_000,
            10_000,
            0.04,
            0.28,
            200_000,
            0.5,
            true,
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn simple(
    id: &str,
    name: &str,
    description: &str,
    category: EventCategory,
    base_amount: i64,
    weight: f64,
    min_round: u32,
    can_repeat: bool,
    affected_by_profession_modifiers: bool,
) -> FinancialEventDefinition {
    FinancialEventDefinition {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category,
        base_amount,
        weight,
        min_round,
        can_repeat,
        affected_by_profession_modifiers,
        choices: Vec::new(),
    }
}

fn with_choices(
    id: &str,
    name: &str,
    description: &str,
    category: EventCategory,
    weight: f64,
    min_round: u32,
    choices: &[(&str, i64, &str)],
) -> FinancialEventDefinition {
    FinancialEventDefinition {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category,
        base_amount: 0,
        weight,
        min_round,
        can_repeat: true,
        affected_by_profession_modifiers: false,
        choices: choices
            .iter()
            .map(|(label, impact, result_text)| EventChoice {
                label: label.to_string(),
                impact: *impact,
                result_text: result_text.to_string(),
            })
            .collect(),
    }
}

pub(super) fn events() -> Vec<FinancialEventDefinition> {
    use EventCategory::*;
    vec![
        simple(
            "car_repair",
            "Car Repair",
            "Your car broke down and needs a new transmission.",
            Expense,
            -1200,
            0.15,
            1,
            true,
            false,
        ),
        simple(
            "parking_ticket",
            "Parking Ticket",
            "You parked in the wrong spot.",
            Expense,
            -150,
            0.18,
            1,
            true,
            false,
        ),
        simple(
            "home_appliance",
            "Broken Appliance",
            "The washing machine gave out.",
            Expense,
            -800,
            0.14,
            1,
            true,
            false,
        ),
        simple(
            "pet_emergency",
            "Pet Emergency",
            "Your pet needs an urgent trip to the vet.",
            Emergency,
            -900,
            0.10,
            1,
            true,
            false,
        ),
        simple(
            "speeding_ticket",
            "Speeding Ticket",
            "Caught going a little too fast.",
            Expense,
            -300,
            0.12,
            1,
            true,
            false,
        ),
        simple(
            "phone_replacement",
            "Phone Replacement",
            "You dropped your phone and the screen shattered.",
            Expense,
            -800,
            0.13,
            1,
            true,
            false,
        ),
        simple(
            "medical_emergency",
            "Medical Emergency",
            "An unexpected hospital visit. Insurance helps if you have it.",
            Emergency,
            -3500,
            0.08,
            1,
            true,
            true,
        ),
        simple(
            "tax_refund",
            "Tax Refund",
            "You overpaid last year and the refund arrived.",
            Income,
            1800,
            0.12,
            3,
            false,
            false,
        ),
        simple(
            "surprise_bonus",
            "Surprise Bonus",
            "Your manager rewarded your hard work.",
            Income,
            2500,
            0.10,
            2,
            true,
            false,
        ),
        simple(
            "found_money",
            "Found Money",
            "You found cash in an old jacket.",
            Income,
            200,
            0.05,
            1,
            true,
            false,
        ),
        simple(
            "insurance_claim",
            "Insurance Claim",
            "An old claim finally paid out.",
            Income,
            2200,
            0.07,
            2,
            false,
            false,
        ),
        simple(
            "freelance_project",
            "Freelance Project",
            "A client hired you for a weekend project.",
            Opportunity,
            2800,
            0.09,
            3,
            true,
            false,
        ),
        simple(
            "side_hustle",
            "Side Hustle",
            "Your side business had a good month.",
            Opportunity,
            1500,
            0.13,
            2,
            true,
            false,
        ),
        with_choices(
            "birthday_party",
            "Birthday Party",
            "It's your birthday. How do you celebrate?",
            Lifestyle,
            0.15,
            1,
            &[
                ("Big Party", -800, "Epic party! Everyone had an amazing time."),
                ("Small Gathering", -300, "A cozy evening with close friends."),
                ("Skip It", 0, "A quiet night in. Your wallet thanks you."),
            ],
        ),
        with_choices(
            "wedding_invitation",
            "Wedding Invitation",
            "A friend is getting married.",
            Lifestyle,
            0.12,
            1,
            &[
                ("Attend + Gift", -400, "Beautiful ceremony and a generous gift."),
                ("Gift Only", -200, "You sent a thoughtful gift."),
                ("Decline", 0, "You sent your regrets."),
            ],
        ),
        with_choices(
            "stock_investment",
            "Stock Tip",
            "A coworker recommends a promising stock.",
            Investment,
            0.10,
            2,
            &[
                ("Invest $2,000", -2000, "You bought in big."),
                ("Invest $1,000", -1000, "You bought a modest position."),
                ("Skip", 0, "You kept your cash."),
            ],
        ),
        with_choices(
            "gym_membership",
            "Gym Membership",
            "The local gym is running a promotion.",
            Lifestyle,
            0.14,
            1,
            &[
                ("Annual Plan", -600, "Committed for the whole year."),
                ("Monthly Trial", -60, "Trying it out for a month."),
                ("Skip", 0, "Running outside is free."),
            ],
        ),
        with_choices(
            "holiday_shopping",
            "Holiday Shopping",
            "The holidays are here and gifts are expected.",
            Lifestyle,
            0.16,
            1,
            &[
                ("Big Spender", -1500, "Everyone loved their presents."),
                ("Budget Shopper", -700, "Thoughtful gifts on a budget."),
                ("Handmade Gifts", -200, "Homemade gifts, made with care."),
            ],
        ),
        with_choices(
            "computer_upgrade",
            "Computer Upgrade",
            "Your computer is getting slow.",
            Lifestyle,
            0.11,
            2,
            &[
                ("High-End PC", -2500, "Blazing fast and beautiful."),
                ("Mid-Range", -1200, "A solid upgrade."),
                ("Keep Old One", 0, "It still works, mostly."),
            ],
        ),
        with_choices(
            "charity_donation",
            "Charity Drive",
            "A local charity is asking for donations.",
            Lifestyle,
            0.13,
            1,
            &[
                ("Generous ($500)", -500, "Your donation made a real difference."),
                ("Small Donation ($100)", -100, "Every bit helps."),
                ("Not Now", 0, "Maybe next time."),
            ],
        ),
    ]
}
