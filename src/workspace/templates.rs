//! Starter files written into a new workspace.

use std::path::Path;

use super::library::{ChartContainer, ChartLibrary};

/// Generate `index.html` for a library.
///
/// The page loads the library from its CDN, then `chart.js`, and keeps an
/// `EventSource` on `/events` open: a `reload` message reloads the page and a
/// dropped connection retries by reloading after two seconds.
pub fn index_html(library: &ChartLibrary) -> String {
    let cdn_scripts = library
        .cdn_links
        .iter()
        .map(|link| format!(r#"  <script src="{}"></script>"#, link))
        .collect::<Vec<_>>()
        .join("\n");

    let container = match library.container() {
        ChartContainer::Div => r#"<div id="chartdiv" style="width: 100%; height: 500px;"></div>"#,
        ChartContainer::Canvas => r#"<canvas id="chartCanvas"></canvas>"#,
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{name} Chart</title>
  <style>
    * {{ margin: 0; padding: 0; box-sizing: border-box; }}
    body {{
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Arial, sans-serif;
      background: #0a0a0a;
      color: #ffffff;
      padding: 20px;
    }}
    #status {{
      position: fixed;
      top: 20px;
      right: 20px;
      padding: 8px 16px;
      background: #4CAF50;
      color: white;
      border-radius: 6px;
      font-family: 'Monaco', 'Courier New', monospace;
      font-size: 12px;
      z-index: 1000;
    }}
    h1 {{ margin-bottom: 20px; font-size: 24px; font-weight: 600; }}
    #chartdiv, #chartCanvas {{ background: #1a1a1a; border-radius: 8px; }}
  </style>
</head>
<body>
  <div id="status">● Connected</div>
  <h1>{name} Visualization</h1>
  {container}

{cdn_scripts}

  <script src="chart.js"></script>

  <script>
    const statusEl = document.getElementById('status');
    const events = new EventSource('/events');

    events.onopen = () => {{
      statusEl.textContent = '● Connected';
      statusEl.style.background = '#4CAF50';
    }};

    events.onmessage = (event) => {{
      if (event.data === 'reload') {{
        statusEl.textContent = '↻ Reloading...';
        statusEl.style.background = '#FF9800';
        setTimeout(() => location.reload(), 100);
      }}
    }};

    events.onerror = () => {{
      statusEl.textContent = '● Disconnected';
      statusEl.style.background = '#f44336';
      setTimeout(() => {{
        events.close();
        location.reload();
      }}, 2000);
    }};
  </script>
</body>
</html>
"#,
        name = library.name,
        container = container,
        cdn_scripts = cdn_scripts,
    )
}

/// Generate the starter `chart.js` for a library.
pub fn chart_js(library: &ChartLibrary) -> String {
    match library.id {
        "amcharts" => AMCHARTS_STARTER.to_string(),
        "chartjs" => CHARTJS_STARTER.to_string(),
        _ => "// Chart code here\nconsole.log('Initialize your chart');\n".to_string(),
    }
}

/// Generate `README.md` describing the workspace.
pub fn readme(library: &ChartLibrary, workspace: &Path, url: &str) -> String {
    format!(
        r#"# {name} Workspace

**Workspace Path:** `{path}`

## Files

- `index.html` - Page with live reload
- `chart.js` - Your chart implementation
- `README.md` - This file

## Instructions

{instructions}

## Development

1. The workspace is served at {url}
2. Edit `chart.js` to change the chart
3. Saving a `.js`, `.html` or `.css` file reloads the page

## Library Documentation

- {name}: {docs}
"#,
        name = library.name,
        path = workspace.display(),
        instructions = library.instructions,
        url = url,
        docs = library.docs_link(),
    )
}

const AMCHARTS_STARTER: &str = r#"// amCharts 5 starter: column chart
const root = am5.Root.new("chartdiv");

root.setThemes([
  am5themes_Animated.new(root)
]);

const chart = root.container.children.push(
  am5xy.XYChart.new(root, {
    panX: true,
    panY: true,
    wheelX: "panX",
    wheelY: "zoomX"
  })
);

const cursor = chart.set("cursor", am5xy.XYCursor.new(root, {}));
cursor.lineY.set("visible", false);

const xAxis = chart.xAxes.push(
  am5xy.CategoryAxis.new(root, {
    categoryField: "category",
    renderer: am5xy.AxisRendererX.new(root, { minGridDistance: 30 })
  })
);

const yAxis = chart.yAxes.push(
  am5xy.ValueAxis.new(root, {
    renderer: am5xy.AxisRendererY.new(root, {})
  })
);

const series = chart.series.push(
  am5xy.ColumnSeries.new(root, {
    name: "Series",
    xAxis: xAxis,
    yAxis: yAxis,
    valueYField: "value",
    categoryXField: "category"
  })
);

const data = [
  { category: "A", value: 100 },
  { category: "B", value: 200 },
  { category: "C", value: 150 },
  { category: "D", value: 300 }
];

xAxis.data.setAll(data);
series.data.setAll(data);

series.appear(1000);
chart.appear(1000, 100);
"#;

const CHARTJS_STARTER: &str = r#"// Chart.js starter: bar chart
const ctx = document.getElementById('chartCanvas').getContext('2d');

const myChart = new Chart(ctx, {
  type: 'bar',
  data: {
    labels: ['Red', 'Blue', 'Yellow', 'Green', 'Purple', 'Orange'],
    datasets: [{
      label: '# of Votes',
      data: [12, 19, 3, 5, 2, 3],
      backgroundColor: 'rgba(54, 162, 235, 0.4)',
      borderColor: 'rgba(54, 162, 235, 1)',
      borderWidth: 1
    }]
  },
  options: {
    responsive: true,
    plugins: {
      legend: { position: 'top' },
      title: { display: true, text: 'Sample Chart' }
    },
    scales: {
      y: { beginAtZero: true }
    }
  }
});
"#;
