//! Catalog of supported charting libraries.

use serde::Serialize;

/// A charting library a workspace can be scaffolded for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartLibrary {
    pub id: &'static str,
    pub name: &'static str,
    /// Usage notes written into the README.
    pub instructions: &'static str,
    /// Scripts loaded by the generated page, in order.
    pub cdn_links: &'static [&'static str],
}

/// How the generated page hosts the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartContainer {
    /// `<div id="chartdiv">`, used by amCharts.
    Div,
    /// `<canvas id="chartCanvas">`, used by Chart.js.
    Canvas,
}

impl ChartLibrary {
    /// Find a library by id.
    pub fn find(id: &str) -> Option<&'static ChartLibrary> {
        LIBRARIES.iter().find(|library| library.id == id)
    }

    /// Ids of every supported library, in catalog order.
    pub fn ids() -> Vec<String> {
        LIBRARIES.iter().map(|library| library.id.to_string()).collect()
    }

    pub fn container(&self) -> ChartContainer {
        match self.id {
            "amcharts" => ChartContainer::Div,
            _ => ChartContainer::Canvas,
        }
    }

    /// Main documentation link, shown in the README.
    pub fn docs_link(&self) -> &'static str {
        self.cdn_links.first().copied().unwrap_or_default()
    }
}

pub fn supported_libraries() -> &'static [ChartLibrary] {
    LIBRARIES
}

const AMCHARTS_INSTRUCTIONS: &str = r#"Use amCharts 5 for data visualization. Key patterns:

1. Create the root element:
   const root = am5.Root.new("chartdiv");

2. Apply a theme:
   root.setThemes([am5themes_Animated.new(root)]);

3. Create a chart (XY example):
   const chart = root.container.children.push(
     am5xy.XYChart.new(root, {
       panX: true,
       panY: true,
       wheelX: "panX",
       wheelY: "zoomX"
     })
   );

4. Add axes and series, then call series.data.setAll(data).

5. Dispose on cleanup:
   root.dispose();

The HTML page already loads every CDN script listed for this library."#;

const CHARTJS_INSTRUCTIONS: &str = r#"Use Chart.js for simple, responsive charts. Key patterns:

1. Get the canvas context:
   const ctx = document.getElementById('chartCanvas').getContext('2d');

2. Create the chart:
   const myChart = new Chart(ctx, {
     type: 'bar', // or 'line', 'pie', 'doughnut', ...
     data: {
       labels: ['Red', 'Blue', 'Yellow'],
       datasets: [{ label: 'My Dataset', data: [12, 19, 3] }]
     },
     options: {
       responsive: true,
       plugins: { legend: { position: 'top' } }
     }
   });

3. Destroy on cleanup:
   myChart.destroy();"#;

static LIBRARIES: &[ChartLibrary] = &[
    ChartLibrary {
        id: "amcharts",
        name: "amCharts 5",
        instructions: AMCHARTS_INSTRUCTIONS,
        cdn_links: &[
            "https://cdn.amcharts.com/lib/5/index.js",
            "https://cdn.amcharts.com/lib/5/xy.js",
            "https://cdn.amcharts.com/lib/5/themes/Animated.js",
        ],
    },
    ChartLibrary {
        id: "chartjs",
        name: "Chart.js",
        instructions: CHARTJS_INSTRUCTIONS,
        cdn_links: &["https://cdn.jsdelivr.net/npm/chart.js"],
    },
];
